//! # PDF Module
//!
//! Page-level PDF jobs built on `lopdf`: reading the top-level outline,
//! splitting a document at its bookmarks, merging files, pulling page text,
//! and exporting a `.docx` through an external office converter.

mod bookmarks;
mod export;
mod merge;
mod split;
mod text;

pub use bookmarks::bookmarks;
pub use bookmarks::Bookmark;
pub use export::export_pdf;
pub use merge::merge_documents;
pub use merge::merge_files;
pub use split::load_bookmark_names;
pub use split::sanitize_file_name;
pub use split::split_by_bookmarks;
pub use text::extract_text;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("PDF file '{0}' does not exist")]
    FileNotFound(String),

    #[error("Bookmark names file '{0}' does not exist")]
    NamesFileNotFound(String),

    #[error("The PDF has {bookmarks} bookmarks, but {names} names were provided")]
    BookmarkCountMismatch { bookmarks: usize, names: usize },

    #[error("Malformed PDF structure: {0}")]
    InvalidStructure(String),

    #[error("No documents to merge")]
    NoDocuments,

    #[error("Converter '{converter}' failed on '{input}': {reason}")]
    ConverterFailed {
        converter: String,
        input: String,
        reason: String,
    },
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory PDFs for tests.

    use lopdf::content::Content;
    use lopdf::content::Operation;
    use lopdf::dictionary;
    use lopdf::Document;
    use lopdf::Object;
    use lopdf::ObjectId;
    use lopdf::Stream;
    use lopdf::StringFormat;

    /// A document with one page per entry of `pages`, each page showing its
    /// text, and a top-level outline entry `(title, 1-based page)` per
    /// bookmark.
    pub(crate) fn document(pages: &[&str], bookmarks: &[(&str, usize)]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_ids: Vec<ObjectId> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                    Operation::new("Tj", vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            page_ids.push(page_id);
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => page_ids.len() as i64,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if !bookmarks.is_empty() {
            catalog.set("Outlines", outline(&mut doc, &page_ids, bookmarks));
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub(crate) fn document_bytes(pages: &[&str], bookmarks: &[(&str, usize)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        document(pages, bookmarks).save_to(&mut buffer).unwrap();
        buffer
    }

    fn outline(doc: &mut Document, page_ids: &[ObjectId], bookmarks: &[(&str, usize)]) -> ObjectId {
        let outlines_id = doc.new_object_id();
        let item_ids: Vec<ObjectId> = bookmarks.iter().map(|_| doc.new_object_id()).collect();
        for (index, (title, page)) in bookmarks.iter().enumerate() {
            let mut item = dictionary! {
                "Title" => Object::string_literal(*title),
                "Parent" => outlines_id,
                "Dest" => vec![Object::Reference(page_ids[page - 1]), Object::Name(b"Fit".to_vec())],
            };
            if index > 0 {
                item.set("Prev", item_ids[index - 1]);
            }
            if index + 1 < item_ids.len() {
                item.set("Next", item_ids[index + 1]);
            }
            doc.objects.insert(item_ids[index], Object::Dictionary(item));
        }
        doc.objects.insert(
            outlines_id,
            Object::Dictionary(dictionary! {
                "Type" => "Outlines",
                "First" => item_ids[0],
                "Last" => item_ids[item_ids.len() - 1],
                "Count" => item_ids.len() as i64,
            }),
        );
        outlines_id
    }
}
