//! PDF rendering of a laid-out transcript.

use super::layout::{layout_history, PAGE_HEIGHT, PAGE_WIDTH, FONT_SIZE};
use crate::error::{Result, RoadSafeError};
use crate::session::ChatTurn;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use tracing::{debug, instrument};

const DOCUMENT_TITLE: &str = "Road Safety Chat History";
const LAYER_NAME: &str = "Layer 1";

fn pt_to_mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

/// Render the transcript as PDF bytes using the built-in Times fonts.
#[instrument(skip_all, fields(turns = turns.len()))]
pub fn render_pdf(turns: &[ChatTurn]) -> Result<Vec<u8>> {
    let pages = layout_history(turns);

    let (doc, first_page, first_layer) = PdfDocument::new(
        DOCUMENT_TITLE,
        pt_to_mm(PAGE_WIDTH),
        pt_to_mm(PAGE_HEIGHT),
        LAYER_NAME,
    );

    let regular = doc
        .add_builtin_font(BuiltinFont::TimesRoman)
        .map_err(|e| RoadSafeError::Export(format!("Failed to load font: {}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::TimesBold)
        .map_err(|e| RoadSafeError::Export(format!("Failed to load font: {}", e)))?;

    for (index, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(pt_to_mm(PAGE_WIDTH), pt_to_mm(PAGE_HEIGHT), LAYER_NAME)
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for line in &page.lines {
            let font = if line.bold { &bold } else { &regular };
            layer.use_text(
                line.text.as_str(),
                FONT_SIZE,
                pt_to_mm(line.x),
                pt_to_mm(line.y),
                font,
            );
        }
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| RoadSafeError::Export(format!("Failed to write PDF: {}", e)))?;

    debug!("Rendered {} pages ({} bytes)", pages.len(), bytes.len());
    Ok(bytes)
}
