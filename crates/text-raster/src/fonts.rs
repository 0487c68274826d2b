//! Font resolution and caching.
//!
//! Resolution is delegated to a [`FontResolver`]. The [`FontCache`] wraps a
//! resolver with a process-wide cache that is safe for concurrent lookups,
//! and falls back to generic system families when the requested family is
//! unavailable. Fonts are never mutated once loaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rusttype::Font;

use clipburn_common::error::ClipError;
use clipburn_model::style::{FontSlant, FontWeight, StyleDescriptor};

/// A loaded font, shareable across threads.
pub type FontHandle = Arc<Font<'static>>;

/// Families tried, in order, when the requested family cannot be resolved.
pub const GENERIC_FALLBACK_FAMILIES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
    "FreeSans",
];

/// What to look up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontQuery {
    pub family: String,
    pub weight: FontWeight,
    pub slant: FontSlant,
}

impl FontQuery {
    pub fn new(family: impl Into<String>, weight: FontWeight, slant: FontSlant) -> Self {
        Self {
            family: family.into(),
            weight,
            slant,
        }
    }

    pub fn for_style(style: &StyleDescriptor) -> Self {
        Self::new(style.font_family.clone(), style.weight, style.slant)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("no font found for family {family:?}")]
    NotFound { family: String },

    #[error("font data for {family:?} could not be read")]
    Unreadable { family: String },

    #[error("font face for {family:?} is not usable")]
    Invalid { family: String },
}

impl From<FontError> for ClipError {
    fn from(err: FontError) -> Self {
        ClipError::asset(err.to_string())
    }
}

/// Resolves a family/weight/slant to a loaded font.
pub trait FontResolver: Send + Sync {
    fn resolve(&self, query: &FontQuery) -> Result<FontHandle, FontError>;
}

/// Extra font directory loaded on top of the system fonts.
pub const FONT_DIR_ENV: &str = "CLIPBURN_FONT_DIR";

/// A face picked for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceMatch {
    pub id: fontdb::ID,
    /// Family name as stored in the font.
    pub family: String,
    /// File the face lives in, when it was loaded from disk.
    pub path: Option<PathBuf>,
    /// Face index within a collection file.
    pub index: u32,
}

impl std::fmt::Display for FaceMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} ({})", self.family, path.display()),
            None => write!(f, "{}", self.family),
        }
    }
}

/// Resolves fonts from a [`fontdb`] database of installed faces.
///
/// Families are matched on the names stored inside the font files, ignoring
/// ASCII case. Weight and slant follow the CSS font matching rules.
pub struct SystemFontResolver {
    db: fontdb::Database,
}

impl std::fmt::Debug for SystemFontResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemFontResolver")
            .field("faces", &self.db.len())
            .finish()
    }
}

impl Default for SystemFontResolver {
    fn default() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if let Some(dir) = std::env::var_os(FONT_DIR_ENV) {
            db.load_fonts_dir(PathBuf::from(dir));
        }
        tracing::debug!(faces = db.len(), "Loaded system font database");
        Self { db }
    }
}

impl SystemFontResolver {
    /// Resolver over the fonts in `dirs` only, without the system fonts.
    pub fn with_dirs<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let mut db = fontdb::Database::new();
        for dir in dirs {
            db.load_fonts_dir(dir);
        }
        Self { db }
    }

    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Canonical spelling of an installed family.
    fn family_name(&self, requested: &str) -> Option<&str> {
        let requested = requested.trim();
        if requested.is_empty() {
            return None;
        }
        self.db
            .faces()
            .flat_map(|face| face.families.iter())
            .map(|(name, _)| name.as_str())
            .find(|name| name.eq_ignore_ascii_case(requested))
    }

    /// Best face for a query, if the family is installed.
    pub fn find(&self, query: &FontQuery) -> Option<FaceMatch> {
        let family = self.family_name(&query.family)?;
        let id = self.db.query(&fontdb::Query {
            families: &[fontdb::Family::Name(family)],
            weight: match query.weight {
                FontWeight::Normal => fontdb::Weight::NORMAL,
                FontWeight::Bold => fontdb::Weight::BOLD,
            },
            stretch: fontdb::Stretch::Normal,
            style: match query.slant {
                FontSlant::Normal => fontdb::Style::Normal,
                FontSlant::Italic => fontdb::Style::Italic,
            },
        })?;

        let face = self.db.face(id)?;
        let path = match &face.source {
            fontdb::Source::File(path) | fontdb::Source::SharedFile(path, _) => Some(path.clone()),
            fontdb::Source::Binary(_) => None,
        };
        Some(FaceMatch {
            id,
            family: family.to_string(),
            path,
            index: face.index,
        })
    }
}

impl FontResolver for SystemFontResolver {
    fn resolve(&self, query: &FontQuery) -> Result<FontHandle, FontError> {
        let face = self.find(query).ok_or_else(|| FontError::NotFound {
            family: query.family.clone(),
        })?;
        let font = self
            .db
            .with_face_data(face.id, |data, index| {
                Font::try_from_vec_and_index(data.to_vec(), index)
            })
            .ok_or_else(|| FontError::Unreadable {
                family: face.family.clone(),
            })?;
        let font = font.ok_or_else(|| FontError::Invalid {
            family: face.family.clone(),
        })?;
        tracing::debug!(face = %face, "Resolved font");
        Ok(Arc::new(font))
    }
}

/// Concurrent font cache with generic fallbacks.
pub struct FontCache {
    resolver: Box<dyn FontResolver>,
    fallbacks: Vec<String>,
    fonts: RwLock<HashMap<FontQuery, Option<FontHandle>>>,
}

impl std::fmt::Debug for FontCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCache")
            .field("fallbacks", &self.fallbacks)
            .finish_non_exhaustive()
    }
}

impl FontCache {
    pub fn new(resolver: Box<dyn FontResolver>) -> Self {
        Self::with_fallbacks(
            resolver,
            GENERIC_FALLBACK_FAMILIES
                .iter()
                .map(|f| f.to_string())
                .collect(),
        )
    }

    pub fn with_fallbacks(resolver: Box<dyn FontResolver>, fallbacks: Vec<String>) -> Self {
        Self {
            resolver,
            fallbacks,
            fonts: RwLock::new(HashMap::new()),
        }
    }

    /// Cache backed by the system font directories.
    pub fn system() -> Self {
        Self::new(Box::new(SystemFontResolver::default()))
    }

    /// Font for a style: the requested family, else the first generic
    /// fallback that resolves. `None` only when no font is usable at all.
    pub fn font_for(&self, style: &StyleDescriptor) -> Option<FontHandle> {
        let query = FontQuery::for_style(style);
        if let Some(font) = self.lookup(&query) {
            return Some(font);
        }

        let fallback = self.fallbacks.iter().find_map(|family| {
            self.lookup(&FontQuery::new(family.clone(), style.weight, style.slant))
                .or_else(|| {
                    self.lookup(&FontQuery::new(
                        family.clone(),
                        FontWeight::Normal,
                        FontSlant::Normal,
                    ))
                })
                .map(|font| (family, font))
        });

        match fallback {
            Some((family, font)) => {
                tracing::warn!(
                    requested = %style.font_family,
                    fallback = %family,
                    "Font unavailable, using fallback family"
                );
                Some(font)
            }
            None => {
                tracing::warn!(
                    requested = %style.font_family,
                    "No usable font found, including fallbacks"
                );
                None
            }
        }
    }

    fn lookup(&self, query: &FontQuery) -> Option<FontHandle> {
        if let Ok(fonts) = self.fonts.read() {
            if let Some(cached) = fonts.get(query) {
                return cached.clone();
            }
        }

        let resolved = match self.resolver.resolve(query) {
            Ok(font) => Some(font),
            Err(err) => {
                tracing::debug!(family = %query.family, error = %err, "Font resolution failed");
                None
            }
        };

        if let Ok(mut fonts) = self.fonts.write() {
            fonts.insert(query.clone(), resolved.clone());
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: Arc<AtomicUsize>,
    }

    impl FontResolver for CountingResolver {
        fn resolve(&self, query: &FontQuery) -> Result<FontHandle, FontError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FontError::NotFound {
                family: query.family.clone(),
            })
        }
    }

    #[test]
    fn test_failed_lookups_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = FontCache::with_fallbacks(
            Box::new(CountingResolver {
                calls: calls.clone(),
            }),
            vec!["Fallback Sans".to_string()],
        );
        let style = StyleDescriptor::caption_default();

        assert!(cache.font_for(&style).is_none());
        let first = calls.load(Ordering::SeqCst);
        assert_eq!(first, 3);
        assert!(cache.font_for(&style).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), first);
    }

    const DEJAVU_DIR: &str = "/usr/share/fonts/truetype/dejavu";

    /// Copy DejaVu faces into a temp dir under names that say nothing about
    /// the family or style. `None` when DejaVu is not installed.
    fn renamed_dejavu() -> Option<tempfile::TempDir> {
        let dir = Path::new(DEJAVU_DIR);
        let regular = dir.join("DejaVuSans.ttf");
        let bold = dir.join("DejaVuSans-Bold.ttf");
        if !regular.is_file() || !bold.is_file() {
            eprintln!("skipping: DejaVu Sans is not installed in {DEJAVU_DIR}");
            return None;
        }
        let tmp = tempfile::tempdir().unwrap();
        std::fs::copy(regular, tmp.path().join("dv.ttf")).unwrap();
        std::fs::copy(bold, tmp.path().join("dvbd.ttf")).unwrap();
        Some(tmp)
    }

    fn picked_file(resolver: &SystemFontResolver, query: FontQuery) -> Option<String> {
        resolver
            .find(&query)
            .and_then(|face| face.path)
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    #[test]
    fn test_find_matches_internal_family_name_not_file_name() {
        let Some(tmp) = renamed_dejavu() else { return };
        let resolver = SystemFontResolver::with_dirs(&[tmp.path()]);
        assert_eq!(resolver.face_count(), 2);

        assert_eq!(
            picked_file(
                &resolver,
                FontQuery::new("DejaVu Sans", FontWeight::Normal, FontSlant::Normal)
            )
            .as_deref(),
            Some("dv.ttf")
        );
        assert_eq!(
            picked_file(
                &resolver,
                FontQuery::new("dejavu sans", FontWeight::Bold, FontSlant::Normal)
            )
            .as_deref(),
            Some("dvbd.ttf")
        );
        assert!(resolver
            .find(&FontQuery::new("dv", FontWeight::Normal, FontSlant::Normal))
            .is_none());
    }

    #[test]
    fn test_resolve_loads_rusttype_font() {
        let Some(tmp) = renamed_dejavu() else { return };
        let resolver = SystemFontResolver::with_dirs(&[tmp.path()]);
        let font = resolver
            .resolve(&FontQuery::new("DejaVu Sans", FontWeight::Bold, FontSlant::Normal))
            .unwrap();
        assert!(font.glyph('A').id().0 > 0);
    }

    #[test]
    fn test_invalid_font_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Broken-Regular.ttf"), b"not a font").unwrap();
        let resolver = SystemFontResolver::with_dirs(&[dir.path()]);
        assert_eq!(resolver.face_count(), 0);
        let err = resolver
            .resolve(&FontQuery::new("Broken", FontWeight::Normal, FontSlant::Normal))
            .unwrap_err();
        assert!(matches!(err, FontError::NotFound { .. }));
    }
}
