//! Fixtures and collaborator doubles for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

use crate::error::{Result, SigPacketError};
use crate::oracle::{OracleResponse, RawSignatureBlock, SignatureOracle};
use crate::source::{PageRasterizer, PageTextExtractor, SourceDocument};
use crate::types::RenderedPage;

/// Build a PDF with one page per entry, each page showing its text
pub fn fixture_pdf(pages: &[&str]) -> Vec<u8> {
    fixture_pdf_with_rotation(pages, 0)
}

pub fn fixture_pdf_with_rotation(pages: &[&str], rotate: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        text.as_bytes().to_vec(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().unwrap(),
        ));

        let mut page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]);
        if rotate != 0 {
            page.set("Rotate", Object::Integer(rotate));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    // MediaBox and Resources live on the page tree root and are inherited
    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(pages.len() as i64)),
        ("Kids", Object::Array(kids)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        ),
        ("Resources", Object::Reference(resources_id)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Text of every page in an assembled packet, in page order
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    let count = doc.get_pages().len() as u32;
    (1..=count)
        .map(|n| doc.extract_text(&[n]).unwrap().trim().to_string())
        .collect()
}

/// Text extractor serving canned text by one-based page number
#[derive(Default)]
pub struct CannedText {
    pages: HashMap<u32, String>,
    failing: HashSet<u32>,
}

impl CannedText {
    /// Page `i` of `texts` becomes page number `i + 1`
    pub fn new(texts: &[&str]) -> Self {
        Self {
            pages: texts
                .iter()
                .enumerate()
                .map(|(i, t)| (i as u32 + 1, t.to_string()))
                .collect(),
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, page_number: u32) -> Self {
        self.failing.insert(page_number);
        self
    }
}

#[async_trait]
impl PageTextExtractor for CannedText {
    async fn page_text(&self, _source: &SourceDocument, page_number: u32) -> Result<String> {
        // Let sibling pages in the batch interleave
        tokio::task::yield_now().await;
        if self.failing.contains(&page_number) {
            return Err(SigPacketError::TextExtraction {
                page_number,
                reason: "corrupt content stream".into(),
            });
        }
        Ok(self.pages.get(&page_number).cloned().unwrap_or_default())
    }
}

/// Rasterizer producing a tiny placeholder image, optionally failing on some pages
#[derive(Default)]
pub struct StubRasterizer {
    failing: HashSet<u32>,
}

impl StubRasterizer {
    pub fn failing_on(mut self, page_index: u32) -> Self {
        self.failing.insert(page_index);
        self
    }
}

#[async_trait]
impl PageRasterizer for StubRasterizer {
    async fn render(&self, _source: &SourceDocument, page_index: u32) -> Result<RenderedPage> {
        if self.failing.contains(&page_index) {
            return Err(SigPacketError::Render {
                page_index,
                reason: "rasterizer crashed".into(),
            });
        }
        Ok(RenderedPage {
            page_index,
            data: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".into(),
            width: 1240,
            height: 1754,
        })
    }
}

/// How the scripted oracle answers for one page
#[derive(Clone)]
pub enum Script {
    Blocks(Vec<RawSignatureBlock>),
    Malformed,
    Fail,
    Hang,
}

/// Oracle answering per zero-based page index, tracking concurrent calls
pub struct ScriptedOracle {
    scripts: HashMap<u32, Script>,
    fallback: Script,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedOracle {
    /// Every page answers with no signature blocks unless scripted
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            fallback: Script::Blocks(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, page_index: u32, script: Script) -> Self {
        self.scripts.insert(page_index, script);
        self
    }

    pub fn otherwise(mut self, script: Script) -> Self {
        self.fallback = script;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignatureOracle for ScriptedOracle {
    async fn extract(&self, page: &RenderedPage) -> Result<OracleResponse> {
        self.calls.lock().unwrap().push(page.page_index);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(2)).await;

        let script = self
            .scripts
            .get(&page.page_index)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        if let Script::Hang = script {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script {
            Script::Blocks(blocks) => Ok(OracleResponse::Blocks(blocks)),
            Script::Malformed => Ok(OracleResponse::Malformed("not json".into())),
            Script::Fail | Script::Hang => Err(SigPacketError::Oracle("503 from upstream".into())),
        }
    }
}

pub fn block(party: &str, signatory: &str, capacity: &str) -> RawSignatureBlock {
    RawSignatureBlock {
        party_name: Some(party.to_string()),
        signatory_name: Some(signatory.to_string()),
        capacity: Some(capacity.to_string()),
    }
}
