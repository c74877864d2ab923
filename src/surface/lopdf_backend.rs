//! Default document surface backed by `lopdf`.
//!
//! Draw primitives are realized as content streams appended to the target
//! page's `/Contents`. On the first draw to a page, the page's original
//! content is bracketed in `q`/`Q` so leftover graphics state (an unbalanced
//! transform, a stale color) cannot leak into the overlay; each overlay draw
//! is itself a self-contained `q … Q` stream. Append order is paint order,
//! which is what makes stacking an observable property.

use std::collections::{HashMap, HashSet};
use std::io::Write as _;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::GenericImageView;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::color::Color;
use crate::geometry::Point;
use crate::path_data::PathCommand;
use crate::surface::{
    DocumentSurface, FontHandle, ImageHandle, RasterFormat, StandardFont, SurfaceError,
};

/// US Letter, the fallback when a page has no parseable `/MediaBox`.
const FALLBACK_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

struct EmbeddedFont {
    id: ObjectId,
    name: String,
}

struct EmbeddedImage {
    id: ObjectId,
    name: String,
}

/// A loaded PDF with overlay drawing support.
pub struct LopdfSurface {
    doc: Document,
    /// Page object ids in current document order.
    pages: Vec<ObjectId>,
    /// Pages whose original content has been bracketed in q/Q.
    wrapped: HashSet<ObjectId>,
    fonts: Vec<EmbeddedFont>,
    images: Vec<EmbeddedImage>,
    /// Opacity (in thousandths) to ExtGState object and resource name.
    gstates: HashMap<u16, (ObjectId, String)>,
}

impl DocumentSurface for LopdfSurface {
    fn load(bytes: &[u8]) -> Result<Self, SurfaceError> {
        if bytes
            .windows(b"/Encrypt".len())
            .any(|window| window == b"/Encrypt")
        {
            return Err(SurfaceError::Encrypted);
        }

        let doc = Document::load_mem(bytes)?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(SurfaceError::Empty);
        }

        Ok(Self {
            doc,
            pages,
            wrapped: HashSet::new(),
            fonts: Vec::new(),
            images: Vec::new(),
            gstates: HashMap::new(),
        })
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32), SurfaceError> {
        let page_id = self.page_id(index)?;
        let dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| SurfaceError::Structure(e.to_string()))?;

        let size = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| obj.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = array[0].as_float().ok()?;
                let y0 = array[1].as_float().ok()?;
                let x1 = array[2].as_float().ok()?;
                let y1 = array[3].as_float().ok()?;
                Some(((x1 - x0).abs(), (y1 - y0).abs()))
            })
            .unwrap_or(FALLBACK_PAGE_SIZE);

        Ok(size)
    }

    fn embed_standard_font(&mut self, font: StandardFont) -> Result<FontHandle, SurfaceError> {
        let base_font = match font {
            StandardFont::Helvetica => "Helvetica",
        };
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font,
            "Encoding" => "WinAnsiEncoding",
        });
        let name = format!("OvF{}", self.fonts.len() + 1);
        self.fonts.push(EmbeddedFont { id, name });
        Ok(FontHandle((self.fonts.len() - 1) as u64))
    }

    fn embed_raster_image(
        &mut self,
        bytes: &[u8],
        format: RasterFormat,
    ) -> Result<ImageHandle, SurfaceError> {
        let id = match format {
            RasterFormat::Jpeg => self.embed_jpeg(bytes)?,
            RasterFormat::Png => self.embed_png(bytes)?,
        };
        let name = format!("OvIm{}", self.images.len() + 1);
        log::debug!("embedded {:?} image as /{}", format, name);
        self.images.push(EmbeddedImage { id, name });
        Ok(ImageHandle((self.images.len() - 1) as u64))
    }

    fn draw_text(
        &mut self,
        page: usize,
        text: &str,
        at: Point,
        size: f32,
        font: FontHandle,
        color: Color,
    ) -> Result<(), SurfaceError> {
        let page_id = self.page_id(page)?;
        let (font_id, font_name) = {
            let f = self
                .fonts
                .get(font.0 as usize)
                .ok_or_else(|| SurfaceError::Font("unknown font handle".to_string()))?;
            (f.id, f.name.clone())
        };
        self.register_resource(page_id, b"Font", &font_name, font_id)?;

        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_name.into_bytes()), size.into()],
            ),
            Operation::new("rg", vec![color.r.into(), color.g.into(), color.b.into()]),
            Operation::new("Td", vec![at.x.into(), at.y.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];
        self.append_content(page_id, ops)
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
        let page_id = self.page_id(page)?;
        let (gs_id, gs_name) = self.gstate_for_opacity(opacity);
        self.register_resource(page_id, b"ExtGState", &gs_name, gs_id)?;

        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(gs_name.into_bytes())]),
            Operation::new("rg", vec![color.r.into(), color.g.into(), color.b.into()]),
            Operation::new(
                "re",
                vec![at.x.into(), at.y.into(), width.into(), height.into()],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ];
        self.append_content(page_id, ops)
    }

    fn draw_image(
        &mut self,
        page: usize,
        image: ImageHandle,
        at: Point,
        width: f32,
        height: f32,
    ) -> Result<(), SurfaceError> {
        let page_id = self.page_id(page)?;
        let (image_id, image_name) = {
            let i = self
                .images
                .get(image.0 as usize)
                .ok_or_else(|| SurfaceError::Image("unknown image handle".to_string()))?;
            (i.id, i.name.clone())
        };
        self.register_resource(page_id, b"XObject", &image_name, image_id)?;

        let ops = vec![
            Operation::new("q", vec![]),
            // Unit image space scaled to the target box, translated to the
            // box's bottom-left anchor.
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                    height.into(),
                    at.x.into(),
                    at.y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image_name.into_bytes())]),
            Operation::new("Q", vec![]),
        ];
        self.append_content(page_id, ops)
    }

    fn draw_stroked_path(
        &mut self,
        page: usize,
        commands: &[PathCommand],
        at: Point,
        color: Color,
        stroke_width: f32,
    ) -> Result<(), SurfaceError> {
        let page_id = self.page_id(page)?;

        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("RG", vec![color.r.into(), color.g.into(), color.b.into()]),
            Operation::new("w", vec![stroke_width.into()]),
            Operation::new("J", vec![Object::Integer(1)]),
            Operation::new("j", vec![Object::Integer(1)]),
            Operation::new(
                "cm",
                vec![
                    1.0f32.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                    1.0f32.into(),
                    at.x.into(),
                    at.y.into(),
                ],
            ),
        ];

        // Path data is viewport-oriented (y down); after translating to the
        // mapped origin, emit with y negated.
        let mut cur = Point::new(0.0, 0.0);
        let mut subpath_start = cur;
        for command in commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    ops.push(Operation::new("m", vec![p.x.into(), (-p.y).into()]));
                    cur = p;
                    subpath_start = p;
                }
                PathCommand::LineTo(p) => {
                    ops.push(Operation::new("l", vec![p.x.into(), (-p.y).into()]));
                    cur = p;
                }
                PathCommand::CurveTo(c1, c2, p) => {
                    ops.push(Operation::new(
                        "c",
                        vec![
                            c1.x.into(),
                            (-c1.y).into(),
                            c2.x.into(),
                            (-c2.y).into(),
                            p.x.into(),
                            (-p.y).into(),
                        ],
                    ));
                    cur = p;
                }
                PathCommand::QuadTo(q, p) => {
                    // Elevate to cubic: control points two thirds of the way
                    // from each endpoint toward the quadratic control point.
                    let c1 = Point::new(
                        cur.x + 2.0 / 3.0 * (q.x - cur.x),
                        cur.y + 2.0 / 3.0 * (q.y - cur.y),
                    );
                    let c2 = Point::new(
                        p.x + 2.0 / 3.0 * (q.x - p.x),
                        p.y + 2.0 / 3.0 * (q.y - p.y),
                    );
                    ops.push(Operation::new(
                        "c",
                        vec![
                            c1.x.into(),
                            (-c1.y).into(),
                            c2.x.into(),
                            (-c2.y).into(),
                            p.x.into(),
                            (-p.y).into(),
                        ],
                    ));
                    cur = p;
                }
                PathCommand::Close => {
                    ops.push(Operation::new("h", vec![]));
                    cur = subpath_start;
                }
            }
        }

        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));
        self.append_content(page_id, ops)
    }

    fn remove_page(&mut self, index: usize) -> Result<(), SurfaceError> {
        if index >= self.pages.len() {
            return Err(SurfaceError::PageOutOfRange {
                index,
                count: self.pages.len(),
            });
        }
        self.doc.delete_pages(&[(index + 1) as u32]);
        self.pages.remove(index);
        Ok(())
    }

    fn save(mut self) -> Result<Vec<u8>, SurfaceError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| SurfaceError::Save(e.to_string()))?;
        Ok(buffer)
    }
}

impl LopdfSurface {
    fn page_id(&self, index: usize) -> Result<ObjectId, SurfaceError> {
        self.pages
            .get(index)
            .copied()
            .ok_or(SurfaceError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }

    fn embed_jpeg(&mut self, bytes: &[u8]) -> Result<ObjectId, SurfaceError> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .map_err(|e| SurfaceError::Image(e.to_string()))?;
        let (width, height) = img.dimensions();
        let color_space = if img.color().has_color() {
            "DeviceRGB"
        } else {
            "DeviceGray"
        };

        // JPEG passes through untouched; viewers decode DCT themselves.
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        Ok(self.doc.add_object(Stream::new(dict, bytes.to_vec())))
    }

    fn embed_png(&mut self, bytes: &[u8]) -> Result<ObjectId, SurfaceError> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| SurfaceError::Image(e.to_string()))?;
        let (width, height) = img.dimensions();

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        let rgba = img.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        let mut has_transparency = false;
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
            if pixel.0[3] != 0xff {
                has_transparency = true;
            }
        }

        if has_transparency {
            let smask_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            let smask_id = self
                .doc
                .add_object(Stream::new(smask_dict, deflate(&alpha)?));
            dict.set("SMask", Object::Reference(smask_id));
        }

        Ok(self.doc.add_object(Stream::new(dict, deflate(&rgb)?)))
    }

    fn gstate_for_opacity(&mut self, opacity: f32) -> (ObjectId, String) {
        let key = (opacity.clamp(0.0, 1.0) * 1000.0).round() as u16;
        if let Some((id, name)) = self.gstates.get(&key) {
            return (*id, name.clone());
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => opacity,
            "CA" => opacity,
        });
        let name = format!("OvGs{}", key);
        self.gstates.insert(key, (id, name.clone()));
        (id, name)
    }

    /// Bracket the page's original content in q/Q once, so its final graphics
    /// state cannot affect overlay streams appended afterwards.
    fn ensure_page_wrapped(&mut self, page_id: ObjectId) -> Result<(), SurfaceError> {
        if self.wrapped.contains(&page_id) {
            return Ok(());
        }

        let push_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let pop_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));

        let contents = {
            let dict = self
                .doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| SurfaceError::Structure(e.to_string()))?;
            dict.remove(b"Contents")
        };

        let mut wrapped = vec![Object::Reference(push_id)];
        match contents {
            Some(Object::Array(items)) => wrapped.extend(items),
            Some(reference @ Object::Reference(_)) => wrapped.push(reference),
            Some(Object::Stream(stream)) => {
                // Inline content stream; hoist it to an indirect object so the
                // Contents array can reference it.
                let id = self.doc.add_object(Object::Stream(stream));
                wrapped.push(Object::Reference(id));
            }
            _ => {}
        }
        wrapped.push(Object::Reference(pop_id));

        let dict = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| SurfaceError::Structure(e.to_string()))?;
        dict.set("Contents", Object::Array(wrapped));

        self.wrapped.insert(page_id);
        Ok(())
    }

    /// Encode ops into a new content stream and append it to the page.
    fn append_content(
        &mut self,
        page_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<(), SurfaceError> {
        self.ensure_page_wrapped(page_id)?;

        let encoded = Content { operations }
            .encode()
            .map_err(|e| SurfaceError::Structure(e.to_string()))?;
        let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), encoded));

        let dict = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| SurfaceError::Structure(e.to_string()))?;
        match dict.get_mut(b"Contents") {
            Ok(Object::Array(items)) => items.push(Object::Reference(stream_id)),
            _ => {
                return Err(SurfaceError::Structure(
                    "page Contents is not an array after wrapping".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Register `target` under `name` in the page's resource category,
    /// creating the resources dictionary or the category as needed.
    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        name: &str,
        target: ObjectId,
    ) -> Result<(), SurfaceError> {
        let structure = |e: lopdf::Error| SurfaceError::Structure(e.to_string());

        // Resources may live inline in the page dictionary or behind a
        // reference shared with other pages; resolve to a single location.
        let resources_ref = {
            let dict = self.doc.get_dictionary(page_id).map_err(structure)?;
            match dict.get(b"Resources") {
                Ok(Object::Reference(id)) => Some(*id),
                Ok(_) => None,
                Err(_) => None,
            }
        };

        if resources_ref.is_none() {
            let has_own = self
                .doc
                .get_dictionary(page_id)
                .map(|d| d.has(b"Resources"))
                .unwrap_or(false);
            if !has_own {
                // A page-level resources dictionary overrides inheritance from
                // the page tree entirely, so the inherited entries must be
                // copied down or the original content loses its named
                // resources.
                let inherited = self.inherited_resources(page_id);
                let dict = self
                    .doc
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .map_err(structure)?;
                dict.set("Resources", Object::Dictionary(inherited));
            }
        }

        // The category entry may itself be a reference; resolve before
        // inserting so shared dictionaries keep their other entries.
        let category_ref = {
            let resources = self.resources_dict(page_id, resources_ref)?;
            match resources.get(category) {
                Ok(Object::Reference(id)) => Some(*id),
                Ok(Object::Dictionary(_)) => None,
                _ => {
                    resources.set(category, Object::Dictionary(Dictionary::new()));
                    None
                }
            }
        };

        let sub = match category_ref {
            Some(id) => self
                .doc
                .get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(structure)?,
            None => {
                let resources = self.resources_dict(page_id, resources_ref)?;
                resources
                    .get_mut(category)
                    .and_then(Object::as_dict_mut)
                    .map_err(structure)?
            }
        };
        if !sub.has(name.as_bytes()) {
            sub.set(name, Object::Reference(target));
        }
        Ok(())
    }

    fn resources_dict(
        &mut self,
        page_id: ObjectId,
        resources_ref: Option<ObjectId>,
    ) -> Result<&mut Dictionary, SurfaceError> {
        let structure = |e: lopdf::Error| SurfaceError::Structure(e.to_string());
        match resources_ref {
            Some(id) => self
                .doc
                .get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(structure),
            None => self
                .doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(structure)?
                .get_mut(b"Resources")
                .and_then(Object::as_dict_mut)
                .map_err(structure),
        }
    }

    /// Clone the `/Resources` the page inherits from its ancestors in the
    /// page tree, or an empty dictionary when no ancestor carries one.
    fn inherited_resources(&self, page_id: ObjectId) -> Dictionary {
        let mut seen = HashSet::new();
        let mut current = page_id;
        loop {
            if !seen.insert(current) {
                return Dictionary::new();
            }
            let Ok(dict) = self.doc.get_dictionary(current) else {
                return Dictionary::new();
            };
            if current != page_id {
                match dict.get(b"Resources") {
                    Ok(Object::Reference(id)) => {
                        return self
                            .doc
                            .get_dictionary(*id)
                            .map(Dictionary::clone)
                            .unwrap_or_else(|_| Dictionary::new());
                    }
                    Ok(Object::Dictionary(d)) => return d.clone(),
                    _ => {}
                }
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(id)) => current = *id,
                _ => return Dictionary::new(),
            }
        }
    }
}

/// Approximate WinAnsi encoding: code points up to U+00FF pass through,
/// everything else becomes '?'.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xff {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, SurfaceError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| SurfaceError::Image(e.to_string()))
}
