//! # Report Layout
//!
//! Lays out the two printable documents of the back-office as positioned
//! drawing elements. Drawing them (PDF, preview, plain text) is left to the
//! caller; the layout is already paginated and every coordinate is final.
//!
//! ## Sales Report Pagination
//! ```text
//! ┌──────────────────────────── page (612 × 792 pt) ──────────────────────┐
//! │  y=742  Detailed sales report for 01/03/2024 to 05/03/2024            │
//! │  y=722  Generated: 05/03/2024 18:10                                    │
//! │  y=712  ───────────────────────────────────────────────────────────── │
//! │  y=697  ┌ ID │ Customer │ Seller │ Products │ Payment │ Total │ Date ┐ │
//! │         │ 12 │ Ana      │ maria  │ 2x Mouse │ Cash    │  $50  │ ...  │ │  row = 25
//! │         │    │          │        │ 1x Pad   │         │       │      │ │  + 15 per extra line
//! │         └────────────────────────────────────────────────────────────┘ │
//! │              ... rows while y ≥ 80 + row height ...                    │
//! │  y=40   ───────────────────────────────────────────────────────────── │
//! │  y=30             Page 1 - Inventory system Bodega                     │
//! └────────────────────────────────────────────────────────────────────────┘
//!   after the last row: GRAND TOTAL box (needs y ≥ 80 + 40, else new page)
//! ```
//!
//! A sale with more product lines than a page can hold continues on the
//! following pages; continuation rows repeat only the sale ID.
//!
//! ## Receipt
//! 80 mm wide, `(85 + 5·N) mm + 10 mm` tall for `N` lines; each line of
//! the receipt takes 5 mm so the last element always lands above the
//! bottom edge.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{PaymentMethod, REMOVED_PRODUCT_NAME};

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

/// US letter page size in points.
pub const LETTER: (f32, f32) = (612.0, 792.0);

/// Base height of a sales-report row.
pub const ROW_HEIGHT: f32 = 25.0;

/// Extra height per additional product line in a row.
pub const LINE_HEIGHT: f32 = 15.0;

/// Space reserved at the bottom of each page for the footer.
pub const MARGIN_BOTTOM: f32 = 80.0;

/// Space required below the last row for the grand total.
pub const TOTAL_BLOCK_HEIGHT: f32 = 40.0;

const SIDE_MARGIN: f32 = 40.0;

// =============================================================================
// Document Model
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Font {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub f32, pub f32, pub f32);

pub const ACCENT: Color = Color(0.2, 0.4, 0.6);
pub const BODY: Color = Color(0.2, 0.2, 0.2);
pub const ROW_FILL: Color = Color(0.95, 0.95, 0.95);
pub const WHITE: Color = Color(1.0, 1.0, 1.0);
pub const MUTED: Color = Color(0.4, 0.4, 0.4);

/// One drawing instruction. `(x, y)` is measured from the bottom-left
/// corner of the page, in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        text: String,
        font: Font,
        size: f32,
        color: Color,
        align: Align,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Color,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub elements: Vec<Element>,
}

impl Page {
    fn new(number: usize) -> Self {
        Page {
            number,
            elements: Vec::new(),
        }
    }

    fn text(&mut self, x: f32, y: f32, text: impl Into<String>, font: Font, size: f32, color: Color, align: Align) {
        self.elements.push(Element::Text {
            x,
            y,
            text: text.into(),
            font,
            size,
            color,
            align,
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.elements.push(Element::Line { x1, y1, x2, y2 });
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: Color) {
        self.elements.push(Element::Rect {
            x,
            y,
            width,
            height,
            fill,
        });
    }

    /// Texts drawn on this page, top to bottom.
    pub fn texts(&self) -> Vec<&str> {
        let mut texts: Vec<(f32, f32, &str)> = self
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { x, y, text, .. } => Some((*y, *x, text.as_str())),
                _ => None,
            })
            .collect();
        texts.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.total_cmp(&b.1)));
        texts.into_iter().map(|(_, _, t)| t).collect()
    }

    /// Lowest y coordinate used by any element.
    pub fn lowest_y(&self) -> f32 {
        self.elements
            .iter()
            .map(|e| match e {
                Element::Text { y, .. } => *y,
                Element::Line { y1, y2, .. } => y1.min(*y2),
                Element::Rect { y, .. } => *y,
            })
            .fold(f32::INFINITY, f32::min)
    }
}

/// A laid-out, paginated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    /// Suggested download name.
    pub file_name: String,
    pub width: f32,
    pub height: f32,
    pub pages: Vec<Page>,
}

impl Document {
    /// Plain-text rendering: a character grid per page (4 pt per column,
    /// one row per distinct baseline), pages separated by form feeds.
    pub fn render_text(&self) -> String {
        const COLUMN: f32 = 4.0;
        let columns = (self.width / COLUMN).ceil() as usize;

        let mut pages = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let mut rows: Vec<(f32, Vec<char>)> = Vec::new();
            for element in &page.elements {
                let Element::Text { x, y, text, align, .. } = element else {
                    continue;
                };
                let len = text.chars().count() as f32;
                let start = match align {
                    Align::Left => x / COLUMN,
                    Align::Center => x / COLUMN - len / 2.0,
                    Align::Right => x / COLUMN - len,
                }
                .max(0.0) as usize;

                let index = match rows.iter().position(|(ry, _)| (ry - y).abs() < 0.5) {
                    Some(index) => index,
                    None => {
                        rows.push((*y, vec![' '; columns]));
                        rows.len() - 1
                    }
                };
                let row = &mut rows[index].1;
                for (i, ch) in text.chars().enumerate() {
                    let col = start + i;
                    if col >= row.len() {
                        row.resize(col + 1, ' ');
                    }
                    row[col] = ch;
                }
            }
            rows.sort_by(|a, b| b.0.total_cmp(&a.0));
            let body: Vec<String> = rows
                .into_iter()
                .map(|(_, row)| row.into_iter().collect::<String>().trim_end().to_string())
                .collect();
            pages.push(body.join("\n"));
        }

        pages.join("\n\u{c}\n")
    }
}

// =============================================================================
// Text Helpers
// =============================================================================

/// Shortens `text` to `max` characters, ending in "..." when cut.
///
/// ## Example
/// ```rust
/// use bodega_core::report::truncate;
///
/// assert_eq!(truncate("Keyboard", 10), "Keyboard");
/// assert_eq!(truncate("Mechanical keyboard", 10), "Mechani...");
/// ```
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Price as printed on documents (`$1,234` / `$1,234.50`).
pub fn format_price(amount: Money) -> String {
    amount.to_string()
}

/// Approximate width of `text` in points (average glyph ≈ 0.6 em).
pub fn estimate_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.6
}

// =============================================================================
// Sales Report
// =============================================================================

/// One product line printed inside a sales-report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub quantity: i64,
    pub product_name: String,
}

/// One sale of the sales report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSale {
    pub id: i64,
    pub customer: String,
    pub seller: String,
    pub payment_method: PaymentMethod,
    pub total: Money,
    /// Creation time in the report's local offset.
    pub created_at: DateTime<FixedOffset>,
    pub lines: Vec<ReportLine>,
}

impl ReportSale {
    /// Height of this sale's row: 25 pt plus 15 pt per extra product line.
    pub fn row_height(&self) -> f32 {
        row_height_for(self.lines.len())
    }
}

/// Height of a row listing `lines` product lines.
pub fn row_height_for(lines: usize) -> f32 {
    ROW_HEIGHT + (lines.max(1) - 1) as f32 * LINE_HEIGHT
}

/// Product lines a row starting at `y` can list above the bottom margin.
fn lines_that_fit(y: f32) -> usize {
    let room = y - MARGIN_BOTTOM - ROW_HEIGHT;
    if room < 0.0 {
        0
    } else {
        (room / LINE_HEIGHT).floor() as usize + 1
    }
}

/// Values printed around the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
    pub company_name: String,
    pub generated_at: DateTime<FixedOffset>,
}

const REPORT_HEADERS: [(&str, f32); 7] = [
    ("ID", 50.0),
    ("Customer", 90.0),
    ("Seller", 175.0),
    ("Products", 250.0),
    ("Payment", 360.0),
    ("Total", 420.0),
    ("Date", 480.0),
];

/// Title range: a single date, or "first to last".
pub fn date_range_label(sales: &[ReportSale], fallback: DateTime<FixedOffset>) -> String {
    let first = sales.iter().map(|s| s.created_at).min().unwrap_or(fallback);
    let last = sales.iter().map(|s| s.created_at).max().unwrap_or(fallback);

    if first.date_naive() == last.date_naive() {
        first.format("%d/%m/%Y").to_string()
    } else {
        format!("{} to {}", first.format("%d/%m/%Y"), last.format("%d/%m/%Y"))
    }
}

struct SalesReportWriter<'a> {
    ctx: &'a ReportContext,
    range: String,
    width: f32,
    height: f32,
    pages: Vec<Page>,
    page: Page,
}

impl<'a> SalesReportWriter<'a> {
    fn new(ctx: &'a ReportContext, range: String) -> Self {
        SalesReportWriter {
            ctx,
            range,
            width: LETTER.0,
            height: LETTER.1,
            pages: Vec::new(),
            page: Page::new(1),
        }
    }

    /// Header block; returns the y where the table starts.
    fn header(&mut self) -> f32 {
        let mut y = self.height - 50.0;
        self.page.text(
            SIDE_MARGIN,
            y,
            format!("Detailed sales report for {}", self.range),
            Font::HelveticaBold,
            18.0,
            ACCENT,
            Align::Left,
        );
        y -= 20.0;
        self.page.text(
            SIDE_MARGIN,
            y,
            format!("Generated: {}", self.ctx.generated_at.format("%d/%m/%Y %H:%M")),
            Font::Helvetica,
            10.0,
            BODY,
            Align::Left,
        );
        y -= 10.0;
        self.page.line(SIDE_MARGIN, y, self.width - SIDE_MARGIN, y);
        y - 15.0
    }

    /// Coloured column header; returns the y below it.
    fn table_header(&mut self, y: f32) -> f32 {
        self.page.rect(
            SIDE_MARGIN,
            y - ROW_HEIGHT,
            self.width - 2.0 * SIDE_MARGIN,
            ROW_HEIGHT,
            ACCENT,
        );
        for (label, x) in REPORT_HEADERS {
            self.page.text(
                x,
                y - ROW_HEIGHT / 1.5,
                label,
                Font::HelveticaBold,
                12.0,
                WHITE,
                Align::Left,
            );
        }
        y - ROW_HEIGHT
    }

    fn footer(&mut self) {
        let text = format!(
            "Page {} - Inventory system {}",
            self.page.number, self.ctx.company_name
        );
        self.page.text(
            self.width / 2.0,
            30.0,
            text.trim_end(),
            Font::Helvetica,
            8.0,
            MUTED,
            Align::Center,
        );
        self.page.line(SIDE_MARGIN, 40.0, self.width - SIDE_MARGIN, 40.0);
    }

    /// Closes the current page and starts the next one with its headers.
    fn break_page(&mut self) -> f32 {
        self.footer();
        let next = Page::new(self.page.number + 1);
        self.pages.push(std::mem::replace(&mut self.page, next));
        let y = self.header();
        self.table_header(y)
    }

    /// Draws `lines` of `sale` as one row. Continuation rows carry only
    /// the sale ID next to the products.
    fn row(&mut self, y: f32, sale: &ReportSale, lines: &[ReportLine], continued: bool) {
        let height = row_height_for(lines.len());
        self.page.rect(
            SIDE_MARGIN,
            y - height,
            self.width - 2.0 * SIDE_MARGIN,
            height,
            ROW_FILL,
        );

        let baseline = y - 15.0;
        let cells = [
            (sale.id.to_string(), 50.0, Align::Left),
            (truncate(&sale.customer, 14), 90.0, Align::Left),
            (truncate(&sale.seller, 10), 175.0, Align::Left),
            (truncate(sale.payment_method.label(), 10), 360.0, Align::Left),
            (format_price(sale.total), 460.0, Align::Right),
            (sale.created_at.format("%d/%m/%Y %H:%M").to_string(), 480.0, Align::Left),
        ];
        if continued {
            let (id, x, align) = cells[0].clone();
            self.page.text(x, baseline, id, Font::Helvetica, 10.0, BODY, align);
        } else {
            for (text, x, align) in cells {
                self.page.text(x, baseline, text, Font::Helvetica, 10.0, BODY, align);
            }
        }

        if lines.is_empty() {
            self.page.text(250.0, y - 13.0, "-", Font::Helvetica, 10.0, BODY, Align::Left);
        }
        for (i, line) in lines.iter().enumerate() {
            let name = if line.product_name.trim().is_empty() {
                REMOVED_PRODUCT_NAME
            } else {
                line.product_name.as_str()
            };
            self.page.text(
                250.0,
                y - 13.0 - i as f32 * LINE_HEIGHT,
                truncate(&format!("{}x {}", line.quantity, name), 22),
                Font::Helvetica,
                10.0,
                BODY,
                Align::Left,
            );
        }

        self.page
            .line(SIDE_MARGIN, y - height, self.width - SIDE_MARGIN, y - height);
    }

    fn grand_total(&mut self, y: f32, total: Money) {
        let text = format!("GRAND TOTAL: {}", format_price(total));
        let box_width = estimate_text_width(&text, 14.0) + 20.0;
        self.page.rect(
            self.width - SIDE_MARGIN - box_width,
            y,
            box_width,
            30.0,
            ACCENT,
        );
        self.page.text(
            self.width - SIDE_MARGIN - 10.0,
            y + 8.0,
            text,
            Font::HelveticaBold,
            14.0,
            WHITE,
            Align::Right,
        );
    }

    fn finish(mut self) -> Vec<Page> {
        self.footer();
        self.pages.push(self.page);
        self.pages
    }
}

/// Lays out the detailed sales report.
///
/// Rows are printed in the given order. The grand total is the sum of the
/// sales' totals and is printed once, after the last row.
pub fn sales_report(sales: &[ReportSale], ctx: &ReportContext) -> Document {
    let range = date_range_label(sales, ctx.generated_at);
    let title = format!("Detailed sales report for {}", range);
    let mut writer = SalesReportWriter::new(ctx, range);

    let mut y = writer.header();
    y = writer.table_header(y);

    let mut total = Money::zero();
    for sale in sales {
        if y < MARGIN_BOTTOM + sale.row_height() {
            y = writer.break_page();
        }

        let mut lines = sale.lines.as_slice();
        let mut continued = false;
        loop {
            let (chunk, rest) = lines.split_at(lines_that_fit(y).max(1).min(lines.len()));
            writer.row(y, sale, chunk, continued);
            y -= row_height_for(chunk.len());
            if rest.is_empty() {
                break;
            }
            y = writer.break_page();
            lines = rest;
            continued = true;
        }
        total += sale.total;
    }

    if y < MARGIN_BOTTOM + TOTAL_BLOCK_HEIGHT {
        y = writer.break_page();
    }
    y -= TOTAL_BLOCK_HEIGHT;
    writer.grand_total(y, total);

    Document {
        title,
        file_name: "sales.pdf".to_string(),
        width: LETTER.0,
        height: LETTER.1,
        pages: writer.finish(),
    }
}

// =============================================================================
// Receipt
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub quantity: i64,
    pub product_name: String,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub company_name: String,
    pub tax_id: Option<String>,
    pub sale_id: i64,
    pub customer: String,
    pub seller: String,
    pub created_at: DateTime<FixedOffset>,
    pub lines: Vec<ReceiptLine>,
}

/// Fixed part of the receipt height, in mm.
pub const RECEIPT_BASE_MM: f32 = 85.0;
/// Height per sale line, in mm.
pub const RECEIPT_LINE_MM: f32 = 5.0;
/// Top margin, in mm.
pub const RECEIPT_TOP_MARGIN_MM: f32 = 10.0;
/// Receipt width, in mm.
pub const RECEIPT_WIDTH_MM: f32 = 80.0;

/// Height in points of a receipt with `lines` sale lines.
pub fn receipt_height(lines: usize) -> f32 {
    (RECEIPT_BASE_MM + RECEIPT_LINE_MM * lines as f32) * MM + RECEIPT_TOP_MARGIN_MM * MM
}

/// One product row of the receipt: `qty(2)·····name(15)subtotal(8)`.
fn receipt_row(line: &ReceiptLine) -> String {
    let name: String = if line.product_name.trim().is_empty() {
        REMOVED_PRODUCT_NAME.chars().take(12).collect()
    } else {
        line.product_name.chars().take(12).collect()
    };
    format!(
        "{:>2}     {:<15}{:>8}",
        line.quantity,
        name,
        format_price(line.subtotal)
    )
}

/// Lays out a single-page receipt sized to its lines.
pub fn receipt(data: &ReceiptData) -> Document {
    let width = RECEIPT_WIDTH_MM * MM;
    let height = receipt_height(data.lines.len());
    let left = 5.0 * MM;
    let center = width / 2.0;
    let separator = "-".repeat(32);

    let mut page = Page::new(1);
    let mut y = height - RECEIPT_TOP_MARGIN_MM * MM;

    page.text(center, y, &data.company_name, Font::CourierBold, 10.0, BODY, Align::Center);
    y -= 5.0 * MM;
    let nit = match data.tax_id.as_deref() {
        Some(nit) if !nit.trim().is_empty() => format!("NIT:{}", nit),
        _ => "NIT: N/A".to_string(),
    };
    page.text(center, y, nit, Font::CourierBold, 10.0, BODY, Align::Center);
    y -= 5.0 * MM;
    page.text(
        center,
        y,
        data.created_at.format("%Y-%m-%d %H:%M").to_string(),
        Font::CourierBold,
        10.0,
        BODY,
        Align::Center,
    );
    y -= 10.0 * MM;

    page.text(left, y, format!("Customer: {}", data.customer), Font::Courier, 9.0, BODY, Align::Left);
    y -= 5.0 * MM;
    page.text(left, y, format!("Seller: {}", data.seller), Font::Courier, 9.0, BODY, Align::Left);
    y -= 10.0 * MM;

    page.text(left, y, &separator, Font::Courier, 9.0, BODY, Align::Left);
    y -= 5.0 * MM;
    page.text(left, y, "Qty    Product        Subtotal", Font::CourierBold, 9.0, BODY, Align::Left);
    y -= 5.0 * MM;
    page.text(left, y, &separator, Font::CourierBold, 9.0, BODY, Align::Left);
    y -= 5.0 * MM;

    for line in &data.lines {
        page.text(left, y, receipt_row(line), Font::Courier, 9.0, BODY, Align::Left);
        y -= 5.0 * MM;
    }

    let total: Money = data.lines.iter().map(|l| l.subtotal).sum();
    page.text(left, y, &separator, Font::Courier, 9.0, BODY, Align::Left);
    y -= 5.0 * MM;
    page.text(
        left,
        y,
        format!("{:<20}{:>8}", "TOTAL:", format_price(total)),
        Font::CourierBold,
        10.0,
        BODY,
        Align::Left,
    );
    y -= 10.0 * MM;

    page.text(
        center,
        y,
        format!("Thank you for your purchase {}!", data.customer),
        Font::Courier,
        9.0,
        BODY,
        Align::Center,
    );
    y -= 5.0 * MM;
    page.text(center, y, &data.company_name, Font::CourierBold, 10.0, BODY, Align::Center);

    Document {
        title: format!("Receipt for sale {}", data.sale_id),
        file_name: format!("sale_receipt_{}.pdf", data.sale_id),
        width,
        height,
        pages: vec![page],
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, day, hour, 0, 0)
            .unwrap()
    }

    fn sale(id: i64, lines: usize, total_cents: i64, day: u32) -> ReportSale {
        ReportSale {
            id,
            customer: format!("Customer {id}"),
            seller: "maria".to_string(),
            payment_method: PaymentMethod::Cash,
            total: Money::from_cents(total_cents),
            created_at: at(day, 10),
            lines: (0..lines)
                .map(|i| ReportLine {
                    quantity: 1,
                    product_name: format!("Item {i}"),
                })
                .collect(),
        }
    }

    fn ctx() -> ReportContext {
        ReportContext {
            company_name: "Bodega".to_string(),
            generated_at: at(5, 18),
        }
    }

    fn all_texts(doc: &Document) -> Vec<String> {
        doc.pages
            .iter()
            .flat_map(|p| p.texts().into_iter().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_row_height() {
        assert_eq!(sale(1, 1, 0, 1).row_height(), 25.0);
        assert_eq!(sale(1, 3, 0, 1).row_height(), 55.0);
        assert_eq!(sale(1, 0, 0, 1).row_height(), 25.0);
    }

    #[test]
    fn test_single_page_report() {
        let sales = vec![sale(1, 2, 5000, 1), sale(2, 1, 1250, 3)];
        let doc = sales_report(&sales, &ctx());

        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.title, "Detailed sales report for 01/03/2024 to 03/03/2024");

        let texts = all_texts(&doc);
        assert_eq!(
            texts.iter().filter(|t| t.starts_with("GRAND TOTAL")).count(),
            1
        );
        assert!(texts.contains(&"GRAND TOTAL: $62.50".to_string()));
        assert!(texts.contains(&"Page 1 - Inventory system Bodega".to_string()));
        assert!(texts.contains(&"1x Item 0".to_string()));
    }

    #[test]
    fn test_single_day_range_label() {
        let sales = vec![sale(1, 1, 100, 2), sale(2, 1, 100, 2)];
        assert_eq!(date_range_label(&sales, at(5, 0)), "02/03/2024");
    }

    #[test]
    fn test_pagination_repeats_headers_and_keeps_rows_above_margin() {
        let sales: Vec<_> = (1..=60).map(|i| sale(i, (i % 3 + 1) as usize, 1000, 1)).collect();
        let doc = sales_report(&sales, &ctx());
        assert!(doc.pages.len() > 1);

        for page in &doc.pages {
            let texts = page.texts();
            assert!(texts.iter().any(|t| t.starts_with("Detailed sales report")));
            assert!(texts.contains(&"Customer"));
            assert!(texts
                .iter()
                .any(|t| *t == format!("Page {} - Inventory system Bodega", page.number)));

            for element in &page.elements {
                if let Element::Rect { y, fill, .. } = element {
                    if *fill == ROW_FILL {
                        assert!(*y >= MARGIN_BOTTOM, "row drawn into footer area at {y}");
                    }
                }
            }
        }

        let totals = all_texts(&doc)
            .into_iter()
            .filter(|t| t.starts_with("GRAND TOTAL"))
            .collect::<Vec<_>>();
        assert_eq!(totals, vec!["GRAND TOTAL: $600".to_string()]);

        let ids = all_texts(&doc)
            .into_iter()
            .filter(|t| t.starts_with("Customer "))
            .count();
        assert_eq!(ids, 60);
    }

    #[test]
    fn test_grand_total_moves_to_new_page_when_it_does_not_fit() {
        // Rows start at y = 792 - 50 - 20 - 10 - 15 - 25 = 672.
        // 22 single-line rows leave y = 122: the total still fits.
        let fits: Vec<_> = (1..=22).map(|i| sale(i, 1, 100, 1)).collect();
        assert_eq!(sales_report(&fits, &ctx()).pages.len(), 1);

        // 23 rows leave y = 97 < 80 + 40: the total moves to page 2.
        let sales: Vec<_> = (1..=23).map(|i| sale(i, 1, 100, 1)).collect();
        let doc = sales_report(&sales, &ctx());
        assert_eq!(doc.pages.len(), 2);
        let last = doc.pages.last().unwrap().texts();
        assert!(last.iter().any(|t| t.starts_with("GRAND TOTAL")));
        assert!(!last.iter().any(|t| t.starts_with("Customer ")));
    }

    #[test]
    fn test_sale_taller_than_a_page_continues_on_next_pages() {
        let sales = vec![sale(1, 1, 100, 1), sale(2, 100, 5000, 1)];
        let doc = sales_report(&sales, &ctx());

        // 38 lines fill a fresh page: 25 + 37 * 15 = 580 <= 672 - 80.
        assert_eq!(doc.pages.len(), 4);
        for page in &doc.pages {
            for element in &page.elements {
                if let Element::Rect { y, fill, .. } = element {
                    if *fill == ROW_FILL {
                        assert!(*y >= MARGIN_BOTTOM, "row drawn into footer area at {y}");
                    }
                }
            }
        }

        let texts = all_texts(&doc);
        assert_eq!(texts.iter().filter(|t| t.starts_with("1x Item ")).count(), 101);
        assert!(texts.contains(&"1x Item 99".to_string()));
        assert_eq!(texts.iter().filter(|t| *t == "Customer 2").count(), 1);
        for page in &doc.pages[1..] {
            assert!(page.texts().contains(&"2"));
        }
        assert_eq!(
            texts.iter().filter(|t| t.starts_with("GRAND TOTAL")).collect::<Vec<_>>(),
            vec!["GRAND TOTAL: $51"]
        );
    }

    #[test]
    fn test_receipt_height_formula() {
        let h = receipt_height(3);
        assert!((h - (85.0 + 15.0 + 10.0) * MM).abs() < 1e-3);
    }

    #[test]
    fn test_receipt_fits_all_lines_without_overlap() {
        for n in [0usize, 1, 5, 40] {
            let data = ReceiptData {
                company_name: "Bodega".to_string(),
                tax_id: None,
                sale_id: 9,
                customer: "Ana".to_string(),
                seller: "maria".to_string(),
                created_at: at(1, 9),
                lines: (0..n)
                    .map(|i| ReceiptLine {
                        quantity: 2,
                        product_name: format!("Product number {i}"),
                        subtotal: Money::from_cents(1000),
                    })
                    .collect(),
            };
            let doc = receipt(&data);
            assert_eq!(doc.pages.len(), 1);
            assert!((doc.height - receipt_height(n)).abs() < 1e-3);

            let page = &doc.pages[0];
            assert!(page.lowest_y() > 0.0, "n={n}");

            // Baselines strictly decrease: nothing overlaps.
            let mut ys: Vec<f32> = page
                .elements
                .iter()
                .filter_map(|e| match e {
                    Element::Text { y, .. } => Some(*y),
                    _ => None,
                })
                .collect();
            let count = ys.len();
            ys.dedup_by(|a, b| (*a - *b).abs() < 1e-3);
            assert_eq!(ys.len(), count);
            assert!(ys.windows(2).all(|w| w[0] > w[1]));
        }
    }

    #[test]
    fn test_receipt_content() {
        let data = ReceiptData {
            company_name: "Bodega".to_string(),
            tax_id: Some("900123".to_string()),
            sale_id: 4,
            customer: "Ana".to_string(),
            seller: "maria".to_string(),
            created_at: at(1, 9),
            lines: vec![
                ReceiptLine {
                    quantity: 2,
                    product_name: "Wireless keyboard".to_string(),
                    subtotal: Money::from_cents(9000),
                },
                ReceiptLine {
                    quantity: 1,
                    product_name: String::new(),
                    subtotal: Money::from_cents(150),
                },
            ],
        };
        let doc = receipt(&data);
        let texts = doc.pages[0].texts();

        assert_eq!(texts[0], "Bodega");
        assert_eq!(texts[1], "NIT:900123");
        assert_eq!(texts[2], "2024-03-01 09:00");
        let first = format!(" 2     Wireless key{}$90", " ".repeat(8));
        let removed = format!(" 1     Product remo{}$1.50", " ".repeat(6));
        let total = format!("TOTAL:{}$91.50", " ".repeat(16));
        assert!(texts.contains(&first.as_str()));
        assert!(texts.contains(&removed.as_str()));
        assert!(texts.contains(&total.as_str()));
        assert!(texts.contains(&"Thank you for your purchase Ana!"));
        assert_eq!(doc.file_name, "sale_receipt_4.pdf");
    }

    #[test]
    fn test_render_text() {
        let doc = sales_report(&[sale(1, 1, 2500, 1)], &ctx());
        let text = doc.render_text();
        assert!(text.contains("Detailed sales report for 01/03/2024"));
        assert!(text.contains("GRAND TOTAL: $25"));
        assert!(!text.contains('\u{c}'));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("abcd", 3), "...");
        assert_eq!(truncate("ñandú salvaje", 8), "ñandú...");
    }
}
