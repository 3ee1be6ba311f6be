use crate::error::PropuestaError;
use crate::pdf::PdfError;
use lopdf::Document;
use lopdf::Object;
use lopdf::ObjectId;
use std::path::Path;
use tracing::debug;

/// Page attributes a page may take from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"Resources", b"CropBox", b"Rotate"];

/// Page trees deeper than this are treated as cyclic.
const MAX_TREE_DEPTH: usize = 64;

/// Appends the pages of every document to the first one, in order.
///
/// Object ids of each later document are shifted past the ids already in
/// use, then its pages are hung under the root page tree of the first.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, PropuestaError> {
    let mut documents = documents.into_iter();
    let Some(mut dest) = documents.next() else {
        return Err(PdfError::NoDocuments.into());
    };
    let mut page_ids: Vec<ObjectId> = dest.get_pages().into_values().collect();
    let mut max_id = dest.max_id;

    for source in documents {
        let offset = max_id;
        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        for (id, object) in source.objects {
            dest.objects.insert((id.0 + offset, id.1), shift_references(object, offset));
        }
        page_ids.extend(source_pages.into_iter().map(|id| (id.0 + offset, id.1)));
        max_id = max_id.max(source.max_id + offset);
    }
    dest.max_id = max_id;

    rebuild_page_tree(&mut dest, &page_ids)?;
    debug!(pages = page_ids.len(), "documents merged");
    Ok(dest)
}

/// Merges the PDF files in order and writes the result to `output`.
/// Returns the page count of the merged file.
pub fn merge_files<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<usize, PropuestaError> {
    let mut documents = Vec::with_capacity(inputs.len());
    for input in inputs {
        let input = input.as_ref();
        if !input.is_file() {
            return Err(PdfError::FileNotFound(input.display().to_string()).into());
        }
        documents.push(Document::load(input)?);
    }

    let mut merged = merge_documents(documents)?;
    merged.compress();
    merged.save(output)?;
    Ok(merged.get_pages().len())
}

fn shift_references(object: Object, offset: u32) -> Object {
    match object {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(items) => Object::Array(items.into_iter().map(|item| shift_references(item, offset)).collect()),
        Object::Dictionary(mut dictionary) => {
            for (_, value) in dictionary.iter_mut() {
                *value = shift_references(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dictionary)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = shift_references(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Points the root `Pages` node at `page_ids` and every page back at it.
///
/// Attributes a page inherited from its old ancestors are copied onto the
/// page first, since those ancestors drop out of the tree.
fn rebuild_page_tree(doc: &mut Document, page_ids: &[ObjectId]) -> Result<(), PropuestaError> {
    let pages_id = doc.catalog()?.get(b"Pages")?.as_reference()?;
    let inherited: Vec<_> = page_ids.iter().map(|id| inherited_attributes(doc, *id)).collect();

    let pages = doc
        .get_object_mut(pages_id)?
        .as_dict_mut()
        .map_err(|_| PdfError::InvalidStructure("root page tree is not a dictionary".to_owned()))?;
    pages.set("Kids", page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>());
    pages.set("Count", page_ids.len() as i64);

    for (id, attributes) in page_ids.iter().zip(inherited) {
        if let Ok(page) = doc.get_object_mut(*id).and_then(Object::as_dict_mut) {
            for (key, value) in attributes {
                page.set(key, value);
            }
            page.set("Parent", pages_id);
        }
    }
    Ok(())
}

/// Inheritable attributes the page lacks but one of its ancestors sets,
/// taking the nearest ancestor's value.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found: Vec<(&'static [u8], Object)> = Vec::new();
    let Ok(page) = doc.get_dictionary(page_id) else {
        return found;
    };
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE {
            if page.has(key) || found.iter().any(|(seen, _)| *seen == key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                found.push((key, value.clone()));
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    found
}
