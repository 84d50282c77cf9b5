//! Shared fixtures for ledger integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lopdf::{Document, Object, dictionary};
use scifetch_ledger::{Batch, FetchError, Fetcher, InputLayout, Record};

/// What the fake fetcher does for a DOI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Write a small valid PDF with an /Info dictionary
    ValidPdf,
    /// Write an HTML error page and report success
    Garbage,
    /// Report failure without writing anything
    Fail,
}

/// In-process stand-in for the external download command.
pub struct FakeFetcher {
    default: Behavior,
    overrides: HashMap<String, Behavior>,
    calls: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with(mut self, doi: &str, behavior: Behavior) -> Self {
        self.overrides.insert(doi.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, doi: &str, target: &Path) -> Result<(), FetchError> {
        self.calls.borrow_mut().push(doi.to_string());
        match self.overrides.get(doi).copied().unwrap_or(self.default) {
            Behavior::ValidPdf => {
                write_pdf(target);
                Ok(())
            }
            Behavior::Garbage => {
                fs::write(target, b"<html>Access denied</html>").map_err(FetchError::Spawn)
            }
            Behavior::Fail => Err(FetchError::Exit {
                code: Some(1),
                output: "paper not found".to_string(),
            }),
        }
    }
}

/// Minimal one-page PDF carrying an /Info dictionary.
pub fn write_pdf(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("fixture"),
    });
    doc.trailer.set("Info", info_id);
    doc.save(path).unwrap();
}

pub fn article(index: usize, title: &str, year: i32, doi: Option<&str>) -> Record {
    Record {
        index,
        title: Some(title.to_string()),
        year: Some(year),
        doi: doi.map(String::from),
        document_type: Some("Article".to_string()),
        ..Default::default()
    }
}

pub fn metadata_batch(records: Vec<Record>) -> Batch {
    Batch {
        layout: InputLayout::RepositoryUnique,
        records,
    }
}

pub fn doi_batch(dois: &[Option<&str>]) -> Batch {
    Batch {
        layout: InputLayout::DoiList,
        records: dois
            .iter()
            .enumerate()
            .map(|(i, doi)| Record {
                index: i + 1,
                doi: doi.map(String::from),
                ..Default::default()
            })
            .collect(),
    }
}
