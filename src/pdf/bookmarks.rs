use crate::error::PropuestaError;
use lopdf::Dictionary;
use lopdf::Document;
use lopdf::Object;
use lopdf::ObjectId;
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::debug;
use tracing::warn;

/// Destinations may point at other destinations; give up past this depth.
const MAX_DEPTH: usize = 16;

/// A top-level outline entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Bookmark {
    pub title: String,
    /// 1-based page number
    pub page: u32,
}

/// Reads the top-level outline entries in document order.
///
/// Pages come from explicit destinations, `GoTo` actions, or named
/// destinations (catalog `Dests` dictionary or `Names` tree). An entry whose
/// page cannot be resolved points at page 1.
pub fn bookmarks(doc: &Document) -> Result<Vec<Bookmark>, PropuestaError> {
    let catalog = doc.catalog()?;
    let Ok(outlines) = catalog.get(b"Outlines") else {
        return Ok(Vec::new());
    };
    let Ok(outlines) = doc.dereference(outlines)?.1.as_dict() else {
        return Ok(Vec::new());
    };
    let page_numbers: HashMap<ObjectId, u32> = doc.get_pages().into_iter().map(|(number, id)| (id, number)).collect();

    let mut result = Vec::new();
    let mut visited = HashSet::new();
    let mut current = outlines.get(b"First").and_then(Object::as_reference).ok();
    while let Some(id) = current {
        if !visited.insert(id) {
            warn!(?id, "outline loops back on itself");
            break;
        }
        let item = doc.get_object(id)?.as_dict()?;
        let title = item
            .get(b"Title")
            .and_then(|title| doc.dereference(title))
            .and_then(|(_, title)| title.as_str())
            .map(decode_text)
            .unwrap_or_default();
        let page = match destination_page(doc, item, &page_numbers) {
            Some(page) => page,
            None => {
                warn!(title = %title, "bookmark destination not resolved, using page 1");
                1
            }
        };
        debug!(title = %title, page, "bookmark");
        result.push(Bookmark { title, page });
        current = item.get(b"Next").and_then(Object::as_reference).ok();
    }
    Ok(result)
}

fn destination_page(doc: &Document, item: &Dictionary, pages: &HashMap<ObjectId, u32>) -> Option<u32> {
    let destination = match item.get(b"Dest") {
        Ok(destination) => destination,
        Err(_) => {
            let action = doc.dereference(item.get(b"A").ok()?).ok()?.1.as_dict().ok()?;
            if action.get(b"S").and_then(Object::as_name).ok()? != b"GoTo" {
                return None;
            }
            action.get(b"D").ok()?
        }
    };
    page_of(doc, destination, pages, 0)
}

fn page_of(doc: &Document, destination: &Object, pages: &HashMap<ObjectId, u32>, depth: usize) -> Option<u32> {
    if depth > MAX_DEPTH {
        return None;
    }
    match doc.dereference(destination).ok()?.1 {
        Object::Array(array) => match array.first()? {
            Object::Reference(id) => pages.get(id).copied(),
            Object::Integer(index) => u32::try_from(*index).ok()?.checked_add(1),
            _ => None,
        },
        Object::Dictionary(dictionary) => page_of(doc, dictionary.get(b"D").ok()?, pages, depth + 1),
        Object::Name(name) | Object::String(name, _) => {
            let target = named_destination(doc, name)?;
            page_of(doc, target, pages, depth + 1)
        }
        _ => None,
    }
}

fn named_destination<'a>(doc: &'a Document, name: &[u8]) -> Option<&'a Object> {
    let catalog = doc.catalog().ok()?;
    if let Some(found) = catalog
        .get(b"Dests")
        .and_then(|dests| doc.dereference(dests))
        .and_then(|(_, dests)| dests.as_dict())
        .and_then(|dests| dests.get(name))
        .ok()
    {
        return Some(found);
    }
    let names = doc.dereference(catalog.get(b"Names").ok()?).ok()?.1.as_dict().ok()?;
    search_name_tree(doc, names.get(b"Dests").ok()?, name, 0)
}

fn search_name_tree<'a>(doc: &'a Document, node: &'a Object, name: &[u8], depth: usize) -> Option<&'a Object> {
    if depth > MAX_DEPTH {
        return None;
    }
    let node = doc.dereference(node).ok()?.1.as_dict().ok()?;
    if let Ok(entries) = node.get(b"Names").and_then(Object::as_array) {
        for pair in entries.chunks(2) {
            if let [key, value] = pair {
                if key.as_str().ok() == Some(name) {
                    return Some(value);
                }
            }
        }
    }
    node.get(b"Kids")
        .and_then(Object::as_array)
        .ok()?
        .iter()
        .find_map(|kid| search_name_tree(doc, kid, name, depth + 1))
}

/// Decodes a PDF text string: UTF-16BE when it carries the byte order mark,
/// UTF-8 with its mark, otherwise one byte per character.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            String::from_utf16_lossy(&units)
        }
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => bytes.iter().map(|byte| char::from(*byte)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::document;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    #[test]
    fn top_level_entries_in_order() -> Result<(), PropuestaError> {
        let doc = document(&["a", "b", "c", "d"], &[("Uno", 1), ("Dos", 2), ("Tres", 4)]);
        let found = bookmarks(&doc)?;
        assert_eq!(
            found,
            vec![
                Bookmark { title: "Uno".to_owned(), page: 1 },
                Bookmark { title: "Dos".to_owned(), page: 2 },
                Bookmark { title: "Tres".to_owned(), page: 4 },
            ]
        );
        Ok(())
    }

    #[test]
    fn no_outline_means_no_bookmarks() -> Result<(), PropuestaError> {
        let doc = document(&["a"], &[]);
        assert!(bookmarks(&doc)?.is_empty());
        Ok(())
    }

    #[test]
    fn goto_actions_and_named_destinations() -> Result<(), PropuestaError> {
        let mut doc = document(&["a", "b", "c"], &[("Uno", 1), ("Dos", 1)]);
        let pages = doc.get_pages();
        let third = pages[&3];
        let second = pages[&2];

        let outlines_id = doc.catalog()?.get(b"Outlines")?.as_reference()?;
        let first_id = doc.get_object(outlines_id)?.as_dict()?.get(b"First")?.as_reference()?;
        let second_id = doc.get_object(first_id)?.as_dict()?.get(b"Next")?.as_reference()?;

        let first_item = doc.get_object_mut(first_id)?.as_dict_mut()?;
        first_item.remove(b"Dest");
        first_item.set(
            "A",
            dictionary! {
                "S" => "GoTo",
                "D" => vec![Object::Reference(third), Object::Name(b"Fit".to_vec())],
            },
        );
        doc.get_object_mut(second_id)?.as_dict_mut()?.set("Dest", Object::Name(b"anexo".to_vec()));

        let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
        doc.get_object_mut(catalog_id)?.as_dict_mut()?.set(
            "Dests",
            dictionary! { "anexo" => vec![Object::Reference(second), Object::Name(b"Fit".to_vec())] },
        );

        let pages: Vec<u32> = bookmarks(&doc)?.iter().map(|bookmark| bookmark.page).collect();
        assert_eq!(pages, vec![3, 2]);
        Ok(())
    }

    #[test]
    fn unresolved_destination_falls_back_to_first_page() -> Result<(), PropuestaError> {
        let mut doc = document(&["a", "b"], &[("Uno", 2)]);
        let outlines_id = doc.catalog()?.get(b"Outlines")?.as_reference()?;
        let first_id = doc.get_object(outlines_id)?.as_dict()?.get(b"First")?.as_reference()?;
        doc.get_object_mut(first_id)?.as_dict_mut()?.set("Dest", Object::Name(b"missing".to_vec()));

        assert_eq!(bookmarks(&doc)?[0].page, 1);
        Ok(())
    }

    #[test]
    fn integer_destinations_are_page_indexes() -> Result<(), PropuestaError> {
        let mut doc = document(&["a", "b"], &[("Uno", 1), ("Dos", 1)]);
        let outlines_id = doc.catalog()?.get(b"Outlines")?.as_reference()?;
        let first_id = doc.get_object(outlines_id)?.as_dict()?.get(b"First")?.as_reference()?;
        let second_id = doc.get_object(first_id)?.as_dict()?.get(b"Next")?.as_reference()?;
        doc.get_object_mut(first_id)?
            .as_dict_mut()?
            .set("Dest", vec![Object::Integer(1), Object::Name(b"Fit".to_vec())]);
        doc.get_object_mut(second_id)?
            .as_dict_mut()?
            .set("Dest", vec![Object::Integer(i64::from(u32::MAX)), Object::Name(b"Fit".to_vec())]);

        let pages: Vec<u32> = bookmarks(&doc)?.iter().map(|bookmark| bookmark.page).collect();
        assert_eq!(pages, vec![2, 1]);
        Ok(())
    }

    #[test]
    fn text_strings_decode() {
        assert_eq!(decode_text(b"Anexo 1"), "Anexo 1");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xF1, 0x00, 0x6F]), "Año");
        assert_eq!(decode_text(&[0x41, 0xF1, 0x6F]), "Año");
    }
}
