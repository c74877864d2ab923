//! The annotation mutation engine.
//!
//! [`apply`] takes a source document buffer, an ordered annotation list, and a
//! set of page-deletion indices, and produces a new document buffer. Two
//! failure tiers keep one malformed annotation from poisoning the batch:
//! load/font/save problems are fatal ([`crate::error::Error`]), everything
//! per-item is recorded in the [`ApplyReport`] and logged, never raised.
//!
//! Annotations are applied strictly in caller order, so later annotations
//! paint over earlier ones. Page deletions run after all drawing, highest index
//! first, so no annotation's already-resolved page reference is invalidated
//! mid-batch.

use std::collections::HashSet;

use log::{debug, warn};

use crate::annotation::{Annotation, AnnotationRecord, Rejection, RECT_OPACITY};
use crate::error::{Error, Result};
use crate::geometry::{page_box, page_point};
use crate::plan::deletion_plan;
use crate::surface::{DocumentSurface, FontHandle, LopdfSurface, StandardFont};

/// The result of a successful `apply` call.
#[derive(Debug)]
pub struct MutationOutput {
    /// The mutated document, serialized. The input buffer is never touched.
    pub bytes: Vec<u8>,
    /// Per-item outcomes for logging and telemetry.
    pub report: ApplyReport,
}

/// Per-item outcomes of one `apply` call.
#[derive(Debug, Default, PartialEq)]
pub struct ApplyReport {
    /// One outcome per input record, in input order.
    pub outcomes: Vec<AnnotationOutcome>,
    /// Pages actually removed.
    pub pages_deleted: usize,
    /// Deletion indices skipped because they were out of range.
    pub deletions_skipped: usize,
}

impl ApplyReport {
    /// Count of annotations that were drawn.
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == AnnotationStatus::Applied)
            .count()
    }
}

/// What happened to a single annotation record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationOutcome {
    /// The record's caller-assigned id.
    pub id: String,
    /// Applied, skipped, or failed.
    pub status: AnnotationStatus,
}

/// Status of one annotation after processing.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationStatus {
    /// The annotation was drawn.
    Applied,
    /// The annotation was inert; nothing was drawn and that is expected.
    Skipped(SkipReason),
    /// A draw or embed step failed; the batch continued without it.
    Failed(String),
}

/// Why an annotation was inert.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The record failed validation.
    Invalid(Rejection),
    /// The record's page exceeds the document's page count.
    PageOutOfRange {
        /// The record's 1-based page number
        page: u32,
        /// The document's page count
        page_count: usize,
    },
    /// The record's page is scheduled for deletion in this call.
    PageDeleted(usize),
}

/// Apply annotations and page deletions to a PDF using the default backend.
///
/// `annotations` are drawn in the given order; `deleted_pages` are zero-based
/// indices against the original page numbering. Returns the new document
/// bytes plus a per-item report, or a fatal error if the source cannot be
/// loaded or the output cannot be serialized.
pub fn apply(
    source: &[u8],
    annotations: &[AnnotationRecord],
    deleted_pages: &[usize],
) -> Result<MutationOutput> {
    apply_with::<LopdfSurface>(source, annotations, deleted_pages)
}

/// [`apply`] over a caller-chosen document surface.
pub fn apply_with<S: DocumentSurface>(
    source: &[u8],
    annotations: &[AnnotationRecord],
    deleted_pages: &[usize],
) -> Result<MutationOutput> {
    let mut surface = S::load(source).map_err(Error::Load)?;

    // One baseline font for every text annotation in this call.
    let font = surface
        .embed_standard_font(StandardFont::Helvetica)
        .map_err(Error::Font)?;

    let deleted: HashSet<usize> = deleted_pages.iter().copied().collect();
    let mut outcomes = Vec::with_capacity(annotations.len());

    for record in annotations {
        let status = apply_one(&mut surface, font, &deleted, record);
        match &status {
            AnnotationStatus::Applied => debug!("annotation {} applied", record.id),
            AnnotationStatus::Skipped(reason) => {
                debug!("annotation {} skipped: {:?}", record.id, reason)
            }
            AnnotationStatus::Failed(message) => {
                warn!("annotation {} failed: {}", record.id, message)
            }
        }
        outcomes.push(AnnotationOutcome {
            id: record.id.clone(),
            status,
        });
    }

    let mut pages_deleted = 0;
    let mut deletions_skipped = 0;
    for index in deletion_plan(deleted_pages) {
        if index >= surface.page_count() {
            warn!(
                "deletion index {} out of range (page count {}), skipped",
                index,
                surface.page_count()
            );
            deletions_skipped += 1;
            continue;
        }
        match surface.remove_page(index) {
            Ok(()) => pages_deleted += 1,
            Err(e) => {
                warn!("failed to remove page {}: {}", index, e);
                deletions_skipped += 1;
            }
        }
    }

    let bytes = surface.save().map_err(Error::Save)?;
    Ok(MutationOutput {
        bytes,
        report: ApplyReport {
            outcomes,
            pages_deleted,
            deletions_skipped,
        },
    })
}

fn apply_one<S: DocumentSurface>(
    surface: &mut S,
    font: FontHandle,
    deleted: &HashSet<usize>,
    record: &AnnotationRecord,
) -> AnnotationStatus {
    let annotation = match Annotation::from_record(record) {
        Ok(a) => a,
        Err(rejection) => return AnnotationStatus::Skipped(SkipReason::Invalid(rejection)),
    };

    // Page numbers resolve against the numbering at call time; deletions have
    // not happened yet.
    let page_index = (annotation.page() - 1) as usize;
    if page_index >= surface.page_count() {
        return AnnotationStatus::Skipped(SkipReason::PageOutOfRange {
            page: annotation.page(),
            page_count: surface.page_count(),
        });
    }
    if deleted.contains(&page_index) {
        return AnnotationStatus::Skipped(SkipReason::PageDeleted(page_index));
    }

    let (_, page_height) = match surface.page_size(page_index) {
        Ok(size) => size,
        Err(e) => return AnnotationStatus::Failed(e.to_string()),
    };

    let drawn = match annotation {
        Annotation::Text(t) => surface.draw_text(
            page_index,
            &t.text,
            page_point(page_height, t.at),
            t.font_size,
            font,
            t.color,
        ),
        Annotation::Rect(r) => surface.draw_filled_rect(
            page_index,
            page_box(page_height, r.at, r.width, r.height),
            r.width,
            r.height,
            r.color,
            RECT_OPACITY,
        ),
        Annotation::Image(i) => surface
            .embed_raster_image(&i.data, i.format)
            .and_then(|handle| {
                surface.draw_image(
                    page_index,
                    handle,
                    page_box(page_height, i.at, i.width, i.height),
                    i.width,
                    i.height,
                )
            }),
        Annotation::Path(p) => surface.draw_stroked_path(
            page_index,
            &p.commands,
            page_point(page_height, p.at),
            p.color,
            p.stroke_width,
        ),
    };

    match drawn {
        Ok(()) => AnnotationStatus::Applied,
        Err(e) => AnnotationStatus::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::Point;
    use crate::path_data::PathCommand;
    use crate::surface::{ImageHandle, RasterFormat, SurfaceError};
    // The glob pulls in the crate's single-parameter Result alias; the trait
    // impl below needs the two-parameter std form.
    use std::result::Result;

    /// Fake surface that records draw calls instead of producing a PDF.
    ///
    /// Input "bytes" are a comma-separated list of page heights; `save`
    /// serializes the call log, one line per call, so tests can assert on
    /// order and arguments.
    struct RecordingSurface {
        page_heights: Vec<f32>,
        log: Vec<String>,
        fail_image_embeds: bool,
    }

    impl RecordingSurface {
        fn parse_heights(bytes: &[u8]) -> Option<Vec<f32>> {
            let text = std::str::from_utf8(bytes).ok()?;
            text.split(',')
                .map(|part| part.trim().parse::<f32>().ok())
                .collect()
        }
    }

    impl DocumentSurface for RecordingSurface {
        fn load(bytes: &[u8]) -> Result<Self, SurfaceError> {
            let page_heights = Self::parse_heights(bytes)
                .ok_or_else(|| SurfaceError::Structure("bad fixture".to_string()))?;
            if page_heights.is_empty() {
                return Err(SurfaceError::Empty);
            }
            Ok(Self {
                page_heights,
                log: Vec::new(),
                fail_image_embeds: false,
            })
        }

        fn page_count(&self) -> usize {
            self.page_heights.len()
        }

        fn page_size(&self, index: usize) -> Result<(f32, f32), SurfaceError> {
            self.page_heights
                .get(index)
                .map(|h| (612.0, *h))
                .ok_or(SurfaceError::PageOutOfRange {
                    index,
                    count: self.page_heights.len(),
                })
        }

        fn embed_standard_font(
            &mut self,
            _font: StandardFont,
        ) -> Result<FontHandle, SurfaceError> {
            self.log.push("embed_font".to_string());
            Ok(FontHandle(0))
        }

        fn embed_raster_image(
            &mut self,
            bytes: &[u8],
            format: RasterFormat,
        ) -> Result<ImageHandle, SurfaceError> {
            if self.fail_image_embeds {
                return Err(SurfaceError::Image("embed disabled".to_string()));
            }
            self.log
                .push(format!("embed_image len={} format={:?}", bytes.len(), format));
            Ok(ImageHandle(0))
        }

        fn draw_text(
            &mut self,
            page: usize,
            text: &str,
            at: Point,
            size: f32,
            _font: FontHandle,
            color: Color,
        ) -> Result<(), SurfaceError> {
            self.log.push(format!(
                "text page={} at=({},{}) size={} color=({},{},{}) text={:?}",
                page, at.x, at.y, size, color.r, color.g, color.b, text
            ));
            Ok(())
        }

        fn draw_filled_rect(
            &mut self,
            page: usize,
            at: Point,
            width: f32,
            height: f32,
            color: Color,
            opacity: f32,
        ) -> Result<(), SurfaceError> {
            self.log.push(format!(
                "rect page={} at=({},{}) size=({},{}) color=({},{},{}) opacity={}",
                page, at.x, at.y, width, height, color.r, color.g, color.b, opacity
            ));
            Ok(())
        }

        fn draw_image(
            &mut self,
            page: usize,
            _image: ImageHandle,
            at: Point,
            width: f32,
            height: f32,
        ) -> Result<(), SurfaceError> {
            self.log.push(format!(
                "image page={} at=({},{}) size=({},{})",
                page, at.x, at.y, width, height
            ));
            Ok(())
        }

        fn draw_stroked_path(
            &mut self,
            page: usize,
            commands: &[PathCommand],
            at: Point,
            color: Color,
            stroke_width: f32,
        ) -> Result<(), SurfaceError> {
            self.log.push(format!(
                "path page={} at=({},{}) commands={} color=({},{},{}) width={}",
                page,
                at.x,
                at.y,
                commands.len(),
                color.r,
                color.g,
                color.b,
                stroke_width
            ));
            Ok(())
        }

        fn remove_page(&mut self, index: usize) -> Result<(), SurfaceError> {
            if index >= self.page_heights.len() {
                return Err(SurfaceError::PageOutOfRange {
                    index,
                    count: self.page_heights.len(),
                });
            }
            self.page_heights.remove(index);
            self.log.push(format!("remove_page {}", index));
            Ok(())
        }

        fn save(self) -> Result<Vec<u8>, SurfaceError> {
            Ok(self.log.join("\n").into_bytes())
        }
    }

    fn run(
        source: &str,
        annotations: &[AnnotationRecord],
        deletions: &[usize],
    ) -> (String, ApplyReport) {
        let output =
            apply_with::<RecordingSurface>(source.as_bytes(), annotations, deletions).unwrap();
        (String::from_utf8(output.bytes).unwrap(), output.report)
    }

    #[test]
    fn test_text_maps_point_anchor() {
        let records = [AnnotationRecord::text("a1", 1, 50.0, 100.0, "hi")];
        let (log, report) = run("792", &records, &[]);
        assert!(log.contains("text page=0 at=(50,692) size=12"));
        assert_eq!(report.applied(), 1);
    }

    #[test]
    fn test_rect_maps_box_anchor() {
        let records = [AnnotationRecord::rect("r1", 1, 10.0, 10.0, 50.0, 20.0)];
        let (log, _) = run("792", &records, &[]);
        assert!(log.contains("rect page=0 at=(10,762) size=(50,20)"));
        assert!(log.contains("opacity=0.4"));
    }

    #[test]
    fn test_out_of_range_page_is_inert() {
        let records = [
            AnnotationRecord::text("a1", 5, 0.0, 0.0, "nope"),
            AnnotationRecord::text("a2", 1, 0.0, 0.0, "yes"),
        ];
        let (log, report) = run("792", &records, &[]);
        assert!(!log.contains("nope"));
        assert!(log.contains("yes"));
        assert_eq!(
            report.outcomes[0].status,
            AnnotationStatus::Skipped(SkipReason::PageOutOfRange {
                page: 5,
                page_count: 1
            })
        );
        assert_eq!(report.outcomes[1].status, AnnotationStatus::Applied);
    }

    #[test]
    fn test_annotation_on_deleted_page_is_inert() {
        let records = [
            AnnotationRecord::text("a1", 1, 0.0, 0.0, "gone"),
            AnnotationRecord::text("a2", 2, 0.0, 0.0, "kept"),
        ];
        let (log, report) = run("792,792", &records, &[0]);
        assert!(!log.contains("gone"));
        assert!(log.contains("kept"));
        assert_eq!(
            report.outcomes[0].status,
            AnnotationStatus::Skipped(SkipReason::PageDeleted(0))
        );
        assert_eq!(report.pages_deleted, 1);
    }

    #[test]
    fn test_invalid_record_skipped_batch_continues() {
        let records = [
            AnnotationRecord::rect("bad", 1, 0.0, 0.0, 0.0, 0.0),
            AnnotationRecord::text("good", 1, 0.0, 0.0, "ok"),
        ];
        let (log, report) = run("792", &records, &[]);
        assert!(log.contains("ok"));
        assert!(matches!(
            report.outcomes[0].status,
            AnnotationStatus::Skipped(SkipReason::Invalid(Rejection::BadDimensions))
        ));
    }

    #[test]
    fn test_malformed_color_draws_black() {
        let records =
            [AnnotationRecord::rect("r1", 1, 0.0, 0.0, 10.0, 10.0).with_color("notahex")];
        let (log, report) = run("792", &records, &[]);
        assert!(log.contains("color=(0,0,0)"));
        assert_eq!(report.applied(), 1);
    }

    #[test]
    fn test_stacking_order_preserved() {
        let records = [
            AnnotationRecord::rect("a", 1, 5.0, 5.0, 10.0, 10.0).with_color("#ff0000"),
            AnnotationRecord::rect("b", 1, 5.0, 5.0, 10.0, 10.0).with_color("#0000ff"),
        ];
        let (log, _) = run("792", &records, &[]);
        let red = log.find("color=(1,0,0)").unwrap();
        let blue = log.find("color=(0,0,1)").unwrap();
        // Later input draws later, so it paints on top.
        assert!(blue > red);
    }

    #[test]
    fn test_deletions_run_descending_after_draws() {
        let records = [AnnotationRecord::text("a1", 2, 0.0, 0.0, "x")];
        let (log, report) = run("792,792,792", &records, &[0, 2]);
        let text_pos = log.find("text ").unwrap();
        let first_removal = log.find("remove_page 2").unwrap();
        let second_removal = log.find("remove_page 0").unwrap();
        assert!(text_pos < first_removal);
        assert!(first_removal < second_removal);
        assert_eq!(report.pages_deleted, 2);
    }

    #[test]
    fn test_out_of_range_deletion_skipped() {
        let (_, report) = run("792", &[], &[0, 7]);
        assert_eq!(report.pages_deleted, 1);
        assert_eq!(report.deletions_skipped, 1);
    }

    #[test]
    fn test_duplicate_deletions_counted_once() {
        let (_, report) = run("792,792", &[], &[1, 1, 1]);
        assert_eq!(report.pages_deleted, 1);
        assert_eq!(report.deletions_skipped, 0);
    }

    #[test]
    fn test_image_embed_failure_is_isolated() {
        let mut surface = RecordingSurface::load(b"792").unwrap();
        surface.fail_image_embeds = true;
        let font = surface.embed_standard_font(StandardFont::Helvetica).unwrap();

        let png = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAIAAACQd1PeAAAADElEQVR4nGP4z8AAAAMBAQDJ/pLvAAAAAElFTkSuQmCC";
        let bad = AnnotationRecord::image("img", 1, 0.0, 0.0, 10.0, 10.0, png);
        let good = AnnotationRecord::text("txt", 1, 0.0, 0.0, "still here");

        let deleted = HashSet::new();
        let bad_status = apply_one(&mut surface, font, &deleted, &bad);
        let good_status = apply_one(&mut surface, font, &deleted, &good);

        assert!(matches!(bad_status, AnnotationStatus::Failed(_)));
        assert_eq!(good_status, AnnotationStatus::Applied);
    }

    #[test]
    fn test_path_dispatch_maps_origin() {
        let records = [AnnotationRecord::path("p1", 1, 20.0, 30.0, "M 0 0 L 5 5")];
        let (log, _) = run("600", &records, &[]);
        assert!(log.contains("path page=0 at=(20,570) commands=2"));
        assert!(log.contains("width=2"));
    }

    #[test]
    fn test_fatal_load_error() {
        let result = apply_with::<RecordingSurface>(b"not numbers", &[], &[]);
        assert!(matches!(result, Err(Error::Load(_))));
    }

    #[test]
    fn test_determinism_over_fake_surface() {
        let records = [
            AnnotationRecord::text("a", 1, 1.0, 2.0, "t"),
            AnnotationRecord::rect("b", 2, 3.0, 4.0, 5.0, 6.0),
        ];
        let (log1, _) = run("792,792", &records, &[1]);
        let (log2, _) = run("792,792", &records, &[1]);
        assert_eq!(log1, log2);
    }
}
