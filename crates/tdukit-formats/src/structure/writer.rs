use super::{is_present, resolve_size};
use crate::codec;
use crate::config::CodecConfig;
use crate::error::{FormatError, Result};
use crate::links::{LinkRegistry, NULL_ADDRESS};
use crate::schema::{FieldDescriptor, FieldKind, FormatSchema, SizeSpec};
use crate::store::{DataStore, FieldPath, FieldValue, StoreEntry};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Serializer for one store
///
/// Writing happens in two phases. The layout phase walks the schema,
/// resolves every size, count and condition, assigns final offsets and
/// encodes all values except pointers. The emit phase then builds the
/// output registry from the new offsets, copies the encoded fields into
/// place and back-patches pointer fields in ascending address order.
pub struct StructureWriter<'a> {
    schema: &'a FormatSchema,
    store: &'a DataStore,
    config: &'a CodecConfig,
}

/// One encoded field at its final position
struct Slot<'a> {
    path: FieldPath,
    kind: &'a FieldKind,
    offset: usize,
    bytes: Vec<u8>,
}

/// Result of the layout phase
#[derive(Default)]
struct Layout<'a> {
    slots: Vec<Slot<'a>>,
    /// Pointer slots with the address they held in the parsed buffer
    pointers: Vec<(usize, u64)>,
    /// Landing fields with their new offsets
    targets: Vec<(FieldPath, usize)>,
    /// Entries laid out so far; formulas only see these, as when parsing
    visible: DataStore,
    length: usize,
}

impl<'a> StructureWriter<'a> {
    /// Prepare to write `store` with `schema`
    pub fn new(schema: &'a FormatSchema, store: &'a DataStore, config: &'a CodecConfig) -> Self {
        Self {
            schema,
            store,
            config,
        }
    }

    /// Serialize the store
    pub fn write(self) -> Result<Vec<u8>> {
        self.write_with_links().map(|(bytes, _)| bytes)
    }

    /// Serialize the store and return the link registry of the output
    pub fn write_with_links(self) -> Result<(Vec<u8>, LinkRegistry)> {
        debug!(
            "Writing {} entries with schema '{}'",
            self.store.len(),
            self.schema.name()
        );

        let mut layout = Layout::default();
        self.layout_fields(self.schema.fields(), &FieldPath::root(), &mut layout)?;

        let links = self.resolve_links(&layout)?;
        if self.config.validate_output_links {
            links.validate()?;
        }
        let bytes = self.emit(&layout, &links)?;

        debug!(
            "Wrote {} bytes in {} fields ({} links)",
            bytes.len(),
            layout.slots.len(),
            links.source_count()
        );
        Ok((bytes, links))
    }

    fn layout_fields(
        &self,
        fields: &'a [FieldDescriptor],
        scope: &FieldPath,
        layout: &mut Layout<'a>,
    ) -> Result<()> {
        for field in fields {
            let path = scope.child(field.name.as_str());
            if !is_present(field, scope, &layout.visible)? {
                trace!("Skipping {} (condition not met)", path);
                continue;
            }

            match &field.kind {
                FieldKind::Repeater { count, fields } => {
                    self.layout_repeater(count.as_ref(), fields, &path, scope, layout)?;
                }
                kind => self.layout_scalar(field, kind, path, scope, layout)?,
            }
        }
        Ok(())
    }

    fn layout_scalar(
        &self,
        field: &FieldDescriptor,
        kind: &'a FieldKind,
        path: FieldPath,
        scope: &FieldPath,
        layout: &mut Layout<'a>,
    ) -> Result<()> {
        let size = match kind.size() {
            Some(spec) => resolve_size(spec, scope, &layout.visible)?,
            None => 0,
        };
        let offset = layout.length;
        let little_endian = self.schema.is_little_endian();

        let bytes = match (kind, self.store.get(&path)) {
            (FieldKind::Constant { .. }, None) => {
                let bytes =
                    codec::encode_field(kind, &FieldValue::Bytes(Vec::new()), size, little_endian, &path)?;
                let entry = StoreEntry::new(
                    kind.field_type(),
                    kind.is_signed(),
                    bytes.clone(),
                    FieldValue::Bytes(bytes.clone()),
                );
                layout.visible.insert(path.clone(), entry);
                bytes
            }
            (_, None) => return Err(FormatError::MissingField(path.to_string())),
            (_, Some(entry)) => {
                layout.visible.insert(path.clone(), entry.clone());
                if field.link_source {
                    let FieldValue::Integer(address) = entry.value() else {
                        return Err(FormatError::TypeMismatch {
                            path: path.to_string(),
                            expected: "integer",
                            actual: entry.value().type_name(),
                        });
                    };
                    layout.pointers.push((layout.slots.len(), *address as u64));
                    vec![0; size]
                } else if self.config.reuse_unchanged_raw
                    && entry.raw().len() == size
                    && codec::decode_field(kind, entry.raw(), little_endian)
                        .is_ok_and(|decoded| &decoded == entry.value())
                {
                    entry.raw().to_vec()
                } else {
                    codec::encode_field(kind, entry.value(), size, little_endian, &path)?
                }
            }
        };

        if bytes.len() != size {
            return Err(FormatError::SizeMismatch {
                path: path.to_string(),
                expected: size,
                actual: bytes.len(),
            });
        }

        trace!("{} at 0x{:X}, {} bytes", path, offset, size);
        if field.link_target {
            layout.targets.push((path.clone(), offset));
        }
        layout.length += size;
        layout.slots.push(Slot {
            path,
            kind,
            offset,
            bytes,
        });
        Ok(())
    }

    fn layout_repeater(
        &self,
        count: Option<&SizeSpec>,
        fields: &'a [FieldDescriptor],
        path: &FieldPath,
        scope: &FieldPath,
        layout: &mut Layout<'a>,
    ) -> Result<()> {
        let stored = self.store.repeated_count(path).ok();
        // The count formula sees the repeater itself with no items yet
        layout.visible.insert(path.clone(), StoreEntry::repeater(0, 0));
        let count = match count {
            Some(spec) => resolve_size(spec, scope, &layout.visible)?,
            None => stored.ok_or_else(|| FormatError::MissingField(path.to_string()))?,
        };

        if let Some(stored) = stored
            && stored != count
        {
            warn!(
                "{} holds {} items but its count resolves to {}",
                path, stored, count
            );
        }

        let start = layout.length;
        for index in 0..count {
            self.layout_fields(fields, &path.indexed(index), layout)?;
        }
        if let Some(entry) = layout.visible.get_mut(path) {
            entry.set_value(FieldValue::Repeated(count));
            entry.set_span(layout.length - start);
        }
        Ok(())
    }

    /// Build the output registry from the laid out offsets
    fn resolve_links(&self, layout: &Layout<'a>) -> Result<LinkRegistry> {
        let mut links = LinkRegistry::new();
        let mut new_offsets = HashMap::new();

        for (path, offset) in &layout.targets {
            links.register_target(path.clone(), *offset as u64)?;
            new_offsets.insert(path, *offset as u64);
        }

        for &(slot, old_address) in &layout.pointers {
            let path = &layout.slots[slot].path;
            if old_address == NULL_ADDRESS {
                continue;
            }

            let target = self.store.links().target_at(old_address).ok_or_else(|| {
                FormatError::LinkMismatch(format!(
                    "{path} points to 0x{old_address:08X}, where no target was parsed"
                ))
            })?;
            let new_address = new_offsets.get(target).ok_or_else(|| {
                FormatError::LinkMismatch(format!(
                    "{path} points to {target}, which is not part of the output"
                ))
            })?;
            links.register_source(path.clone(), *new_address)?;
        }

        Ok(links)
    }

    /// Copy the encoded fields into place and back-patch pointers
    fn emit(&self, layout: &Layout<'a>, links: &LinkRegistry) -> Result<Vec<u8>> {
        let mut output = vec![0u8; layout.length];
        let mut slot_by_path = HashMap::with_capacity(layout.pointers.len());

        for slot in &layout.slots {
            output[slot.offset..slot.offset + slot.bytes.len()].copy_from_slice(&slot.bytes);
        }
        for &(index, _) in &layout.pointers {
            slot_by_path.insert(&layout.slots[index].path, &layout.slots[index]);
        }

        for (address, path) in links.sources_sorted_by_address() {
            let slot = slot_by_path.get(path).ok_or_else(|| {
                FormatError::LinkMismatch(format!("{path} is registered but was not laid out"))
            })?;
            let bytes = codec::encode_field(
                slot.kind,
                &FieldValue::Integer(address as i64),
                slot.bytes.len(),
                self.schema.is_little_endian(),
                path,
            )?;
            trace!("Patched {} -> 0x{:X}", path, address);
            output[slot.offset..slot.offset + bytes.len()].copy_from_slice(&bytes);
        }

        Ok(output)
    }
}
