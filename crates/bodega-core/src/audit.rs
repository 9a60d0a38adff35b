//! # Product Audit Diff
//!
//! Computes and renders the field-level changes recorded in the product
//! history.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_product(form)                                                   │
//! │       │                                                                 │
//! │       ├── before = ProductSnapshot (pre-save)                          │
//! │       ├── after  = ProductSnapshot (post-save)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  diff_snapshots(before, after) ── [] ──► no history entry              │
//! │       │                                                                 │
//! │       ▼ [FieldChange, ...]                                              │
//! │  edit_detail(changes, media_url)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  "Quantity increased by 5 (10 → 15)\nName: 'Mouse' → 'USB Mouse'"      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The structured `FieldChange` list is stored next to the rendered text so
//! a presentation layer can render it differently.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Snapshot
// =============================================================================

/// The product fields the edit form exposes, as displayed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub quantity: i64,
    /// Category display name.
    pub category: String,
    /// Storage reference of the image.
    pub image: Option<String>,
}

/// Fields tracked by the audit trail, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Name,
    Description,
    Price,
    Quantity,
    Category,
    Image,
}

impl TrackedField {
    pub const ALL: [TrackedField; 6] = [
        TrackedField::Name,
        TrackedField::Description,
        TrackedField::Price,
        TrackedField::Quantity,
        TrackedField::Category,
        TrackedField::Image,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrackedField::Name => "Name",
            TrackedField::Description => "Description",
            TrackedField::Price => "Price",
            TrackedField::Quantity => "Quantity",
            TrackedField::Category => "Category",
            TrackedField::Image => "Image",
        }
    }
}

// =============================================================================
// Field Change
// =============================================================================

/// One changed field of a product edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    Quantity { before: i64, after: i64 },
    Image {
        before: Option<String>,
        after: Option<String>,
    },
    Name { before: String, after: String },
    /// Any other field, as display strings.
    Other {
        label: String,
        before: String,
        after: String,
    },
}

/// Lists the changes between two snapshots, in `TrackedField::ALL` order.
/// Fields whose value did not change are skipped.
pub fn diff_snapshots(before: &ProductSnapshot, after: &ProductSnapshot) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    for field in TrackedField::ALL {
        match field {
            TrackedField::Name if before.name != after.name => {
                changes.push(FieldChange::Name {
                    before: before.name.clone(),
                    after: after.name.clone(),
                });
            }
            TrackedField::Description if before.description != after.description => {
                changes.push(other(
                    field,
                    display_optional(&before.description),
                    display_optional(&after.description),
                ));
            }
            TrackedField::Price if before.price != after.price => {
                changes.push(other(field, before.price.to_string(), after.price.to_string()));
            }
            TrackedField::Quantity if before.quantity != after.quantity => {
                changes.push(FieldChange::Quantity {
                    before: before.quantity,
                    after: after.quantity,
                });
            }
            TrackedField::Category if before.category != after.category => {
                changes.push(other(field, before.category.clone(), after.category.clone()));
            }
            TrackedField::Image if before.image != after.image => {
                changes.push(FieldChange::Image {
                    before: before.image.clone(),
                    after: after.image.clone(),
                });
            }
            _ => {}
        }
    }

    changes
}

fn other(field: TrackedField, before: String, after: String) -> FieldChange {
    FieldChange::Other {
        label: field.label().to_string(),
        before,
        after,
    }
}

fn display_optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(empty)".to_string())
}

// =============================================================================
// Rendering
// =============================================================================

/// Renders one change as a single detail line.
///
/// `media_url` turns a storage reference into the URL used in `<img>` tags.
pub fn render_change(change: &FieldChange, media_url: &dyn Fn(&str) -> String) -> String {
    match change {
        FieldChange::Quantity { before, after } => {
            let delta = after - before;
            let verb = if delta >= 0 { "increased" } else { "reduced" };
            format!(
                "Quantity {} by {} ({} → {})",
                verb,
                delta.abs(),
                before,
                after
            )
        }
        FieldChange::Image { before, after } => match (before, after) {
            (Some(old), Some(new)) => format!(
                "Image replaced: {} → {}",
                img_tag(&media_url(old), "previous image"),
                img_tag(&media_url(new), "new image")
            ),
            (None, Some(new)) => format!("Image added: {}", img_tag(&media_url(new), "new image")),
            (Some(_), None) => "Image removed".to_string(),
            (None, None) => "Image unchanged".to_string(),
        },
        FieldChange::Name { before, after } => format!(
            "Name: '{}' → '{}'",
            escape_html(before),
            escape_html(after)
        ),
        FieldChange::Other {
            label,
            before,
            after,
        } => format!(
            "{}: {} → {}",
            label,
            escape_html(before),
            escape_html(after)
        ),
    }
}

/// Joins the rendered changes, one per line. `None` when nothing changed.
pub fn edit_detail(changes: &[FieldChange], media_url: &dyn Fn(&str) -> String) -> Option<String> {
    if changes.is_empty() {
        return None;
    }

    Some(
        changes
            .iter()
            .map(|c| render_change(c, media_url))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Detail text of a `Created` entry.
pub fn creation_detail(product_name: &str) -> String {
    format!(
        "Product <strong>'{}'</strong> added to the catalog.",
        escape_html(product_name)
    )
}

/// Detail text of a `Deleted` entry.
pub fn deletion_detail(product_name: &str) -> String {
    format!(
        "Product <strong>'{}'</strong> removed from the system.",
        escape_html(product_name)
    )
}

/// Name recorded for products whose name is blank.
pub fn history_name(product_name: &str) -> String {
    let trimmed = product_name.trim();
    if trimmed.is_empty() {
        "Unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

fn img_tag(src: &str, alt: &str) -> String {
    format!(
        "<img src=\"{}\" alt=\"{}\" class=\"history-thumb\">",
        escape_html(src),
        alt
    )
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn media(key: &str) -> String {
        format!("/media/{key}")
    }

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            name: "Mouse".to_string(),
            description: None,
            price: Money::from_cents(2500),
            quantity: 10,
            category: "Logitech".to_string(),
            image: None,
        }
    }

    #[test]
    fn test_quantity_increase() {
        let before = snapshot();
        let after = ProductSnapshot {
            quantity: 15,
            ..snapshot()
        };

        let changes = diff_snapshots(&before, &after);
        assert_eq!(changes, vec![FieldChange::Quantity { before: 10, after: 15 }]);

        let detail = edit_detail(&changes, &media).unwrap();
        assert!(detail.contains("increased"));
        assert!(detail.contains("10"));
        assert!(detail.contains("15"));
        assert_eq!(detail, "Quantity increased by 5 (10 → 15)");
    }

    #[test]
    fn test_quantity_reduction() {
        let change = FieldChange::Quantity { before: 10, after: 7 };
        assert_eq!(render_change(&change, &media), "Quantity reduced by 3 (10 → 7)");
    }

    #[test]
    fn test_no_changes_means_no_detail() {
        let changes = diff_snapshots(&snapshot(), &snapshot());
        assert!(changes.is_empty());
        assert_eq!(edit_detail(&changes, &media), None);
    }

    #[test]
    fn test_image_changes() {
        let replaced = FieldChange::Image {
            before: Some("products/a.jpg".to_string()),
            after: Some("products/b.jpg".to_string()),
        };
        let text = render_change(&replaced, &media);
        assert!(text.starts_with("Image replaced"));
        assert!(text.contains("/media/products/a.jpg"));
        assert!(text.contains("/media/products/b.jpg"));

        let added = FieldChange::Image {
            before: None,
            after: Some("products/b.jpg".to_string()),
        };
        assert!(render_change(&added, &media).starts_with("Image added"));

        let removed = FieldChange::Image {
            before: Some("products/a.jpg".to_string()),
            after: None,
        };
        assert_eq!(render_change(&removed, &media), "Image removed");
    }

    #[test]
    fn test_multiple_changes_one_line_each() {
        let before = snapshot();
        let after = ProductSnapshot {
            name: "USB Mouse".to_string(),
            price: Money::from_cents(2750),
            description: Some("Wireless".to_string()),
            ..snapshot()
        };

        let changes = diff_snapshots(&before, &after);
        assert_eq!(changes.len(), 3);

        let detail = edit_detail(&changes, &media).unwrap();
        let lines: Vec<_> = detail.lines().collect();
        assert_eq!(lines[0], "Name: 'Mouse' → 'USB Mouse'");
        assert_eq!(lines[1], "Description: (empty) → Wireless");
        assert_eq!(lines[2], "Price: $25 → $27.50");
    }

    #[test]
    fn test_change_list_serializes_with_field_tag() {
        let json = serde_json::to_string(&vec![FieldChange::Quantity { before: 1, after: 2 }]).unwrap();
        assert_eq!(json, r#"[{"field":"quantity","before":1,"after":2}]"#);

        let back: Vec<FieldChange> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![FieldChange::Quantity { before: 1, after: 2 }]);
    }

    #[test]
    fn test_fixed_texts_escape_names() {
        assert_eq!(
            deletion_detail("Mouse"),
            "Product <strong>'Mouse'</strong> removed from the system."
        );
        assert!(creation_detail("<b>x</b>").contains("&lt;b&gt;x&lt;/b&gt;"));
        assert_eq!(history_name("  "), "Unnamed");
    }
}
