// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF assembler — compiles an ordered set of images into one multi-page PDF
// using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised
// via `PdfDocument::save()`. Each input image becomes one page, scaled to
// fit within the page margins and centred, never upscaled.

use std::path::Path;

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

use bildwerk_core::capability::{Assembler, ImagePayload};
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::PaperSize;

/// Builds one print-ready PDF from the session's ready images.
#[derive(Debug, Clone)]
pub struct PdfAssembler {
    /// Paper size for every page.
    paper_size: PaperSize,
    /// Resolution assumed for the embedded images.
    dpi: f32,
    /// Page margin on all four sides.
    margin_mm: f32,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfAssembler {
    /// Create a new assembler targeting the given paper size.
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            dpi: 150.0,
            margin_mm: 15.0,
            title: None,
        }
    }

    /// Create a new assembler defaulting to A4.
    pub fn a4() -> Self {
        Self::new(PaperSize::A4)
    }

    /// Build an assembler matching a session configuration.
    pub fn from_config(config: &bildwerk_core::SessionConfig) -> Self {
        Self::new(config.paper_size).with_dpi(config.assembly_dpi)
    }

    /// Set a title for the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the resolution assumed for the embedded images.
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Build the document synchronously. One page per input, in order.
    #[instrument(skip(self, pages), fields(pages = pages.len(), paper = ?self.paper_size))]
    pub fn build(&self, pages: &[ImagePayload]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(BildwerkError::Assembly("no pages to assemble".into()));
        }

        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Bildwerk Document");
        info!(title, "assembling document");

        let mut doc = PdfDocument::new(title);
        let mut pdf_pages: Vec<PdfPage> = Vec::with_capacity(pages.len());

        for (index, payload) in pages.iter().enumerate() {
            let page = self
                .build_page(&mut doc, payload, page_w, page_h)
                .map_err(|err| {
                    BildwerkError::Assembly(format!("page {}: {err}", index + 1))
                })?;
            pdf_pages.push(page);
        }

        doc.with_pages(pdf_pages);
        debug!(pages = doc.pages.len(), "page layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(bytes = output.len(), warnings = warnings.len(), "document serialised");
        Ok(output)
    }

    /// Place one image on one page, scaled to fit within the margins while
    /// preserving its aspect ratio, centred. Never upscales.
    fn build_page(
        &self,
        doc: &mut PdfDocument,
        payload: &ImagePayload,
        page_w: Mm,
        page_h: Mm,
    ) -> Result<PdfPage> {
        let dynamic_image = ::image::load_from_memory(&payload.bytes)
            .map_err(|err| BildwerkError::ImageError(format!("failed to decode image: {err}")))?;

        let img_width = dynamic_image.width() as usize;
        let img_height = dynamic_image.height() as usize;

        let rgb_image = dynamic_image.to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: img_width,
            height: img_height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = doc.add_image(&raw);

        let usable_w_pt = Mm(page_w.0 - 2.0 * self.margin_mm).into_pt().0;
        let usable_h_pt = Mm(page_h.0 - 2.0 * self.margin_mm).into_pt().0;

        // Image native size at the configured DPI.
        let img_w_pt = img_width as f32 / self.dpi * 72.0;
        let img_h_pt = img_height as f32 / self.dpi * 72.0;

        // Scale to fit while preserving aspect ratio; do not upscale.
        let scale_x = usable_w_pt / img_w_pt;
        let scale_y = usable_h_pt / img_h_pt;
        let scale = scale_x.min(scale_y).min(1.0);

        let rendered_w_pt = img_w_pt * scale;
        let rendered_h_pt = img_h_pt * scale;

        // Centre the image on the page.
        let margin_pt = Mm(self.margin_mm).into_pt().0;
        let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
        let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x_offset)),
                translate_y: Some(Pt(y_offset)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(self.dpi),
                rotate: None,
            },
        }];

        Ok(PdfPage::new(page_w, page_h, ops))
    }

    /// Assemble and write the document directly to a file.
    pub fn write_to_file(&self, pages: &[ImagePayload], path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.build(pages)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(path = %path.as_ref().display(), bytes = bytes.len(), "wrote document");
        Ok(())
    }
}

impl Assembler for PdfAssembler {
    fn assemble(
        &self,
        pages: Vec<ImagePayload>,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send {
        let assembler = self.clone();
        async move {
            tokio::task::spawn_blocking(move || assembler.build(&pages))
                .await
                .map_err(|err| BildwerkError::Assembly(format!("assembly task aborted: {err}")))?
        }
    }
}
