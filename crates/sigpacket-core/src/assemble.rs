//! Packet assembly
//!
//! Builds one PDF per group by copying source pages into a fresh document.
//!
//! The algorithm:
//! 1. Drop records with zero copies
//! 2. Partition the rest with the active grouping mode
//! 3. Order each group by document name, then page index
//! 4. For each record, import its source document once per packet (object IDs
//!    offset to avoid conflicts), then append one new page object per copy,
//!    each sharing the source page's content and resources
//! 5. Prune unreachable objects, compress and serialize

use std::collections::HashMap;

use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId};
use tracing::{debug, info};

use crate::error::{Result, SigPacketError};
use crate::grouping::{partition, GroupingMode};
use crate::naming::unique_file_names;
use crate::source::SourceDocument;
use crate::types::{Document, SignatureRecord};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// One output PDF for one group
#[derive(Debug, Clone)]
pub struct Packet {
    pub file_name: String,
    pub group: String,
    pub page_count: usize,
    pub data: Vec<u8>,
}

/// Assemble one packet per group of `records`
///
/// Any failure aborts the whole run: a partial set of packets is never returned.
pub fn assemble_packets(
    documents: &[Document],
    records: &[SignatureRecord],
    mode: GroupingMode,
) -> Result<Vec<Packet>> {
    let printable: Vec<SignatureRecord> = records
        .iter()
        .filter(|r| r.copies > 0)
        .cloned()
        .collect();

    let groups = partition(&printable, mode);
    let file_names = unique_file_names(groups.iter().map(|g| g.label.as_str()));

    // Each source is parsed once per run, however many pages it contributes
    let mut sources: HashMap<&str, SourceDocument> = HashMap::new();
    let mut packets = Vec::with_capacity(groups.len());

    for (group, file_name) in groups.into_iter().zip(file_names) {
        let mut pages: Vec<&SignatureRecord> = group.records;
        pages.sort_by(|a, b| {
            a.document_name
                .cmp(&b.document_name)
                .then(a.page_index.cmp(&b.page_index))
        });

        let mut builder = PacketBuilder::new();
        for record in pages {
            if !sources.contains_key(record.document_id.as_str()) {
                let document = documents
                    .iter()
                    .find(|d| d.id == record.document_id)
                    .ok_or_else(|| SigPacketError::DocumentNotFound(record.document_id.clone()))?;
                let source = SourceDocument::load(document.name.as_str(), &document.bytes)?;
                sources.insert(document.id.as_str(), source);
            }
            let source = sources
                .get(record.document_id.as_str())
                .ok_or_else(|| SigPacketError::DocumentNotFound(record.document_id.clone()))?;

            builder.add_page(&record.document_id, source.pdf(), record.page_index, record.copies)?;
        }

        let page_count = builder.page_count();
        let data = builder.finish()?;
        debug!(group = %group.label, file = %file_name, pages = page_count, "Assembled packet");

        packets.push(Packet {
            file_name,
            group: group.label,
            page_count,
            data,
        });
    }

    info!(packets = packets.len(), mode = ?mode, "Packet assembly complete");
    Ok(packets)
}

/// Copy a single page into a standalone one-page PDF
pub fn extract_single_page(source: &PdfDocument, page_index: u32) -> Result<Vec<u8>> {
    let mut builder = PacketBuilder::new();
    builder.add_page("source", source, page_index, 1)?;
    builder.finish()
}

/// Incrementally builds an output PDF from pages of other documents
pub struct PacketBuilder {
    doc: PdfDocument,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// ID offset applied to each imported source, keyed by caller-chosen source key
    offsets: HashMap<String, u32>,
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuilder {
    pub fn new() -> Self {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append `copies` copies of the page at `page_index` of `source`
    ///
    /// `key` identifies the source so its objects are imported only once.
    pub fn add_page(
        &mut self,
        key: &str,
        source: &PdfDocument,
        page_index: u32,
        copies: u32,
    ) -> Result<()> {
        let (page_id, page) = page_dictionary(source, page_index)?;

        // Inherited attributes must move onto the page: its new parent has none
        let mut template = page.clone();
        for attribute in INHERITABLE {
            if !template.has(attribute) {
                if let Some(value) = resolve_inherited(source, page, attribute) {
                    template.set(attribute, value);
                }
            }
        }

        let offset = self.import(key, source);
        let mut template = match remap_object_refs(Object::Dictionary(template), offset) {
            Object::Dictionary(dict) => dict,
            _ => {
                return Err(SigPacketError::OperationError(format!(
                    "Page object {:?} is not a dictionary",
                    page_id
                )))
            }
        };
        template.set("Parent", Object::Reference(self.pages_id));

        for _ in 0..copies {
            let copy_id = self.doc.add_object(Object::Dictionary(template.clone()));
            self.kids.push(copy_id);
        }
        Ok(())
    }

    /// Import every object of `source` under a fresh ID range, once per key
    fn import(&mut self, key: &str, source: &PdfDocument) -> u32 {
        if let Some(offset) = self.offsets.get(key) {
            return *offset;
        }

        let offset = self.doc.max_id;
        for (old_id, object) in source.objects.iter() {
            let new_id = (old_id.0 + offset, old_id.1);
            self.doc
                .objects
                .insert(new_id, remap_object_refs(object.clone(), offset));
        }
        self.doc.max_id = source.max_id + offset;
        self.offsets.insert(key.to_string(), offset);
        offset
    }

    /// Write the page tree and catalog, drop unused imports and serialize
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let kids = self
            .kids
            .iter()
            .map(|&id| Object::Reference(id))
            .collect::<Vec<_>>();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(self.kids.len() as i64)),
            ("Kids", Object::Array(kids)),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        // Imported catalogs, page trees and unused pages are unreachable now
        self.doc.prune_objects();
        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).map_err(|e| {
            SigPacketError::SerializationError(format!("Failed to save packet: {}", e))
        })?;
        Ok(buffer)
    }
}

/// Object ID and dictionary of the page at a zero-based index
pub(crate) fn page_dictionary(
    doc: &PdfDocument,
    page_index: u32,
) -> Result<(ObjectId, &Dictionary)> {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let page_id = *pages
        .get(&(page_index + 1))
        .ok_or(SigPacketError::PageOutOfRange {
            page_index,
            page_count,
        })?;
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| SigPacketError::ParseError(format!("Invalid page object: {}", e)))?;
    Ok((page_id, page))
}

/// Look up an attribute on a page, walking up the page tree if needed
pub(crate) fn resolve_inherited(
    doc: &PdfDocument,
    page: &Dictionary,
    key: &[u8],
) -> Option<Object> {
    if let Ok(value) = page.get(key) {
        return Some(value.clone());
    }

    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    // Bounded walk guards against cyclic Parent links
    for _ in 0..64 {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}
