use crate::objects::{number, resolve, resolve_dict, stream_bytes};
use lopdf::{Dictionary, Document, Object};

/// Color spaces the rasterizer can map to RGB.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorSpace>, hival: usize, lookup: Vec<u8> },
    /// Spot colors are shown as gray ink: tint 1 is black.
    Separation,
    Pattern,
    Unsupported(String),
}

impl ColorSpace {
    pub(crate) fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } | Self::Separation => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
            Self::Pattern | Self::Unsupported(_) => 0,
        }
    }

    /// Initial color after selecting this space with `cs`/`CS`.
    pub(crate) fn initial_color(&self) -> Option<[f32; 3]> {
        match self {
            Self::Cmyk => self.to_rgb(&[0.0, 0.0, 0.0, 1.0]),
            Self::Separation => self.to_rgb(&[1.0]),
            Self::Indexed { .. } => self.to_rgb(&[0.0]),
            _ => self.to_rgb(&[0.0, 0.0, 0.0]),
        }
    }

    /// Maps components (normalized 0..=1, or a raw index for `Indexed`) to RGB.
    pub(crate) fn to_rgb(&self, components: &[f32]) -> Option<[f32; 3]> {
        let at = |index: usize| components.get(index).copied().unwrap_or(0.0).clamp(0.0, 1.0);

        match self {
            Self::Gray => {
                let gray = at(0);
                Some([gray, gray, gray])
            }
            Self::Rgb => Some([at(0), at(1), at(2)]),
            Self::Cmyk => {
                let k = 1.0 - at(3);
                Some([(1.0 - at(0)) * k, (1.0 - at(1)) * k, (1.0 - at(2)) * k])
            }
            Self::Separation => {
                let gray = 1.0 - at(0);
                Some([gray, gray, gray])
            }
            Self::Indexed { base, hival, lookup } => {
                let index = components.first().copied().unwrap_or(0.0).max(0.0) as usize;
                let index = index.min(*hival);
                let width = base.components();
                let entry = lookup.get(index * width..(index + 1) * width)?;
                let normalized: Vec<f32> = entry.iter().map(|v| f32::from(*v) / 255.0).collect();
                base.to_rgb(&normalized)
            }
            Self::Pattern | Self::Unsupported(_) => None,
        }
    }

    /// Resolves a color space operand or dictionary value.
    pub(crate) fn resolve(
        doc: &Document,
        resources: Option<&Dictionary>,
        object: &Object,
    ) -> ColorSpace {
        Self::resolve_depth(doc, resources, object, 0)
    }

    fn resolve_depth(
        doc: &Document,
        resources: Option<&Dictionary>,
        object: &Object,
        depth: usize,
    ) -> ColorSpace {
        if depth > 4 {
            return Self::Unsupported("nested color space".to_owned());
        }
        let Some(object) = resolve(doc, object) else {
            return Self::Unsupported("dangling color space".to_owned());
        };

        match object {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"G" | b"CalGray" => Self::Gray,
                b"DeviceRGB" | b"RGB" | b"CalRGB" => Self::Rgb,
                b"DeviceCMYK" | b"CMYK" => Self::Cmyk,
                b"Pattern" => Self::Pattern,
                other => {
                    let named = resources
                        .and_then(|resources| resources.get(b"ColorSpace").ok())
                        .and_then(|spaces| resolve_dict(doc, spaces))
                        .and_then(|spaces| spaces.get(other).ok());
                    match named {
                        Some(named) => Self::resolve_depth(doc, resources, named, depth + 1),
                        None => Self::Unsupported(String::from_utf8_lossy(other).into_owned()),
                    }
                }
            },
            Object::Array(items) => Self::from_array(doc, resources, items, depth),
            _ => Self::Unsupported("malformed color space".to_owned()),
        }
    }

    fn from_array(
        doc: &Document,
        resources: Option<&Dictionary>,
        items: &[Object],
        depth: usize,
    ) -> ColorSpace {
        let family = items.first().and_then(|item| item.as_name().ok()).unwrap_or_default();

        match family {
            b"ICCBased" => {
                let channels = items
                    .get(1)
                    .and_then(|stream| resolve(doc, stream))
                    .and_then(|stream| stream.as_stream().ok())
                    .and_then(|stream| stream.dict.get(b"N").ok())
                    .and_then(number);
                match channels.map(|n| n as i64) {
                    Some(1) => Self::Gray,
                    Some(3) => Self::Rgb,
                    Some(4) => Self::Cmyk,
                    _ => Self::Unsupported("ICCBased".to_owned()),
                }
            }
            b"CalGray" => Self::Gray,
            b"CalRGB" => Self::Rgb,
            b"Separation" => Self::Separation,
            b"Pattern" => Self::Pattern,
            b"Indexed" | b"I" => {
                let base = match items.get(1) {
                    Some(base) => Self::resolve_depth(doc, resources, base, depth + 1),
                    None => return Self::Unsupported("Indexed".to_owned()),
                };
                let hival = items.get(2).and_then(number).unwrap_or(0.0).max(0.0) as usize;
                let lookup = items.get(3).and_then(|lookup| match resolve(doc, lookup)? {
                    Object::String(bytes, _) => Some(bytes.clone()),
                    Object::Stream(stream) => stream_bytes(stream).ok(),
                    _ => None,
                });
                match lookup {
                    Some(lookup) if base.components() > 0 => {
                        Self::Indexed { base: Box::new(base), hival, lookup }
                    }
                    _ => Self::Unsupported("Indexed".to_owned()),
                }
            }
            other => Self::Unsupported(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn cmyk_black_and_separation_tint_map_to_black() {
        assert_eq!(ColorSpace::Cmyk.initial_color(), Some([0.0, 0.0, 0.0]));
        assert_eq!(ColorSpace::Separation.to_rgb(&[1.0]), Some([0.0, 0.0, 0.0]));
        assert_eq!(ColorSpace::Separation.to_rgb(&[0.0]), Some([1.0, 1.0, 1.0]));
    }

    #[test]
    fn indexed_looks_up_base_color() {
        let space = ColorSpace::Indexed {
            base: Box::new(ColorSpace::Rgb),
            hival: 1,
            lookup: vec![255, 0, 0, 0, 0, 255],
        };
        assert_eq!(space.to_rgb(&[1.0]), Some([0.0, 0.0, 1.0]));
        assert_eq!(space.to_rgb(&[9.0]), Some([0.0, 0.0, 1.0]));
    }

    #[test]
    fn named_space_resolves_through_resources() {
        let doc = Document::with_version("1.5");
        let resources = lopdf::dictionary! {
            "ColorSpace" => lopdf::dictionary! {
                "CS0" => vec![Object::Name(b"CalRGB".to_vec())],
            },
        };

        let space = ColorSpace::resolve(&doc, Some(&resources), &Object::Name(b"CS0".to_vec()));
        assert_eq!(space, ColorSpace::Rgb);
        assert_eq!(ColorSpace::resolve(&doc, None, &Object::Name(b"Lab".to_vec())).components(), 0);
    }
}
