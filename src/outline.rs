//! Destinations, annotations, and the document outline tree.
//!
//! All three reference pages, whose object numbers only exist once the page
//! tree is laid out at document close, so serialization here is driven by
//! the write pass and takes the resolved page object numbers as input.

use std::collections::HashMap;
use std::fmt::Write;

use crate::error::{PdfError, Result};
use crate::types::{OutlineId, PageId, PdfRect};

/// Where a jump lands on its target page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DestinationKind {
    /// Position with optional coordinates and zoom.
    Xyz {
        x: Option<f64>,
        y: Option<f64>,
        zoom: Option<f64>,
    },
    /// Fit the whole page.
    Fit,
    /// Fit the given rectangle.
    FitR { left: f64, bottom: f64, right: f64, top: f64 },
}

/// A target location inside the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub page: PageId,
    pub kind: DestinationKind,
}

impl Destination {
    pub fn fit(page: PageId) -> Self {
        Destination {
            page,
            kind: DestinationKind::Fit,
        }
    }

    pub fn xyz(page: PageId, x: Option<f64>, y: Option<f64>, zoom: Option<f64>) -> Self {
        Destination {
            page,
            kind: DestinationKind::Xyz { x, y, zoom },
        }
    }

    /// Serialize as a destination array, e.g. `[5 0 R /XYZ 0 792 null]`.
    pub(crate) fn to_array(&self, page_objects: &[i32]) -> Result<String> {
        let page_obj = page_objects
            .get(self.page.0)
            .copied()
            .ok_or(PdfError::BadResourceId)?;
        let mut buf = String::new();
        let _ = write!(buf, "[ {} 0 R ", page_obj);
        match self.kind {
            DestinationKind::Xyz { x, y, zoom } => {
                buf.push_str("/XYZ");
                for v in [x, y, zoom] {
                    match v {
                        Some(v) => {
                            let _ = write!(buf, " {}", v);
                        }
                        None => buf.push_str(" null"),
                    }
                }
            }
            DestinationKind::Fit => buf.push_str("/Fit"),
            DestinationKind::FitR { left, bottom, right, top } => {
                let _ = write!(buf, "/FitR {} {} {} {}", left, bottom, right, top);
            }
        }
        buf.push_str(" ]");
        Ok(buf)
    }
}

/// An annotation attached to a page.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// A clickable link to a destination in this document.
    Link { rect: PdfRect, dest: Destination },
    /// A text note ("sticky note").
    Text { rect: PdfRect, contents: String },
}

impl Annotation {
    pub(crate) fn to_dict(&self, page_objects: &[i32]) -> Result<String> {
        match self {
            Annotation::Link { rect, dest } => Ok(format!(
                "<<\n  /Type /Annot\n  /Subtype /Link\n  /Rect [ {} {} {} {} ]\n  /Border [ 0 0 0 ]\n  /Dest {}\n>>\n",
                rect.x1,
                rect.y1,
                rect.x2,
                rect.y2,
                dest.to_array(page_objects)?
            )),
            Annotation::Text { rect, contents } => Ok(format!(
                "<<\n  /Type /Annot\n  /Subtype /Text\n  /Rect [ {} {} {} {} ]\n  /Contents ({})\n>>\n",
                rect.x1,
                rect.y1,
                rect.x2,
                rect.y2,
                escape_literal_string(contents)
            )),
        }
    }
}

/// Escape the characters with meaning inside a PDF literal string.
pub(crate) fn escape_literal_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// One outline tree node as collected during document building.
#[derive(Debug, Clone)]
pub(crate) struct Outline {
    pub title: String,
    pub dest: Destination,
    pub parent: Option<OutlineId>,
}

/// A serialized outline node, ready to be added as an object.
pub(crate) struct OutlineObject {
    pub object_number: i32,
    pub dictionary: String,
}

/// Lay out the outline tree as PDF objects.
///
/// Node object numbers start at `first_object` in depth-first order, with
/// the root Outlines dictionary last. Returns the finished dictionaries and
/// the root's object number; None when there are no outlines.
pub(crate) fn build_outline_objects(
    outlines: &[Outline],
    page_objects: &[i32],
    first_object: i32,
) -> Result<Option<(Vec<OutlineObject>, i32)>> {
    if outlines.is_empty() {
        return Ok(None);
    }

    // Children per parent, insertion order preserved.
    let mut children: HashMap<Option<usize>, Vec<usize>> = HashMap::new();
    for (i, o) in outlines.iter().enumerate() {
        children
            .entry(o.parent.map(|p| p.0))
            .or_default()
            .push(i);
    }

    // Depth-first numbering so siblings and parents are resolvable.
    let mut order = Vec::with_capacity(outlines.len());
    let mut stack: Vec<usize> = children
        .get(&None)
        .map(|roots| roots.iter().rev().copied().collect())
        .unwrap_or_default();
    while let Some(node) = stack.pop() {
        order.push(node);
        if let Some(kids) = children.get(&Some(node)) {
            stack.extend(kids.iter().rev().copied());
        }
    }

    let mut object_of: HashMap<usize, i32> = HashMap::new();
    for (pos, &node) in order.iter().enumerate() {
        object_of.insert(node, first_object + pos as i32);
    }
    let root_object = first_object + order.len() as i32;

    // Total descendant count, all nodes open.
    fn subtree_size(children: &HashMap<Option<usize>, Vec<usize>>, node: usize) -> usize {
        children
            .get(&Some(node))
            .map(|kids| {
                kids.iter()
                    .map(|&k| 1 + subtree_size(children, k))
                    .sum()
            })
            .unwrap_or(0)
    }

    let mut objects = Vec::with_capacity(order.len() + 1);
    for &node in &order {
        let o = &outlines[node];
        let parent_obj = match o.parent {
            Some(p) => object_of[&p.0],
            None => root_object,
        };
        let siblings = &children[&o.parent.map(|p| p.0)];
        let at = siblings
            .iter()
            .position(|&s| s == node)
            .expect("node is indexed under its own parent");
        let prev = at.checked_sub(1).map(|i| object_of[&siblings[i]]);
        let next = siblings.get(at + 1).map(|&s| object_of[&s]);
        let kids = children.get(&Some(node));

        let mut dict = String::from("<<\n");
        let _ = write!(dict, "  /Title ({})\n", escape_literal_string(&o.title));
        let _ = write!(dict, "  /Parent {} 0 R\n", parent_obj);
        let _ = write!(dict, "  /Dest {}\n", o.dest.to_array(page_objects)?);
        if let Some(prev) = prev {
            let _ = write!(dict, "  /Prev {} 0 R\n", prev);
        }
        if let Some(next) = next {
            let _ = write!(dict, "  /Next {} 0 R\n", next);
        }
        if let Some(kids) = kids {
            let _ = write!(dict, "  /First {} 0 R\n", object_of[kids.first().unwrap()]);
            let _ = write!(dict, "  /Last {} 0 R\n", object_of[kids.last().unwrap()]);
            let _ = write!(dict, "  /Count {}\n", subtree_size(&children, node));
        }
        dict.push_str(">>\n");
        objects.push(OutlineObject {
            object_number: object_of[&node],
            dictionary: dict,
        });
    }

    // The root Outlines dictionary.
    let roots = &children[&None];
    let mut dict = String::from("<<\n  /Type /Outlines\n");
    let _ = write!(dict, "  /First {} 0 R\n", object_of[roots.first().unwrap()]);
    let _ = write!(dict, "  /Last {} 0 R\n", object_of[roots.last().unwrap()]);
    let _ = write!(dict, "  /Count {}\n", outlines.len());
    dict.push_str(">>\n");
    objects.push(OutlineObject {
        object_number: root_object,
        dictionary: dict,
    });

    Ok(Some((objects, root_object)))
}
