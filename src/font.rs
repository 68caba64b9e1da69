use crate::error::FolioError;
use std::fs;
use std::path::Path;

// Letter-frequency weighted sample of running Spanish/English prose.
const ADVANCE_SAMPLE: &str =
    "La seguridad alimentaria de los hogares en el departamento mejoro durante el trimestre, \
     segun los datos de consumo reportados. Food security in the region improved this quarter 2024.";

#[derive(Debug, Clone, PartialEq)]
pub struct FontAdvance {
    pub family: String,
    pub average_em: f32,
}

pub fn load_font_advance(path: &Path) -> Result<FontAdvance, FolioError> {
    let data = fs::read(path)?;
    let source = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("font");
    font_advance_from_bytes(&data, source)
}

pub fn font_advance_from_bytes(data: &[u8], source: &str) -> Result<FontAdvance, FolioError> {
    let Ok(face) = ttf_parser::Face::parse(data, 0) else {
        return Err(FolioError::Font(format!("invalid font data for {source}")));
    };
    let units = face.units_per_em().max(1) as f32;
    let mut total = 0u64;
    let mut count = 0u64;
    for ch in ADVANCE_SAMPLE.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            continue;
        };
        total += face.glyph_hor_advance(gid).unwrap_or(0) as u64;
        count += 1;
    }
    if count == 0 || total == 0 {
        return Err(FolioError::Font(format!(
            "{source} has no Latin glyph advances"
        )));
    }
    let family = face
        .names()
        .into_iter()
        .filter(|entry| entry.name_id == ttf_parser::name::name_id::FAMILY)
        .find_map(|entry| entry.to_string())
        .unwrap_or_else(|| source.to_string());
    Ok(FontAdvance {
        family,
        average_em: total as f32 / count as f32 / units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_font_bytes() {
        let err = font_advance_from_bytes(b"not a font", "bogus").expect_err("garbage");
        assert!(matches!(err, FolioError::Font(_)), "unexpected error: {err}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_font_advance(Path::new("/nonexistent/folio-font.ttf"))
            .expect_err("file does not exist");
        assert!(matches!(err, FolioError::Io(_)));
    }
}
