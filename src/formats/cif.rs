//! Small-molecule / inorganic CIF parser
//!
//! Reads the unit cell, the `_atom_site_fract_*` loop and the symmetry
//! operations of the first data block, and expands the asymmetric unit into
//! the full cell.
//!
//! Format reference: https://www.iucr.org/resources/cif/spec

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::chem::elements::{atomic_number, infer_element};
use crate::error::{DataError, Result};
use crate::formats::symmetry::SymOp;
use crate::structure::{Crystal, Lattice};

/// Fractional tolerance for merging symmetry-equivalent positions
const SITE_TOLERANCE: f64 = 1e-4;

/// Sites with occupancy below `1 - OCCUPANCY_TOLERANCE` are disordered
const OCCUPANCY_TOLERANCE: f64 = 1e-3;

const CELL_TAGS: [&str; 6] = [
    "_cell_length_a",
    "_cell_length_b",
    "_cell_length_c",
    "_cell_angle_alpha",
    "_cell_angle_beta",
    "_cell_angle_gamma",
];

const SYMOP_TAGS: [&str; 2] = [
    "_symmetry_equiv_pos_as_xyz",
    "_space_group_symop_operation_xyz",
];

/// Parse a CIF file into a crystal
pub fn parse_cif_file<P: AsRef<Path>>(path: P) -> Result<Crystal> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_cif_str(&text).map_err(|e| match e {
        DataError::Parse(msg) => DataError::Parse(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Parse CIF text into a crystal
pub fn parse_cif_str(text: &str) -> Result<Crystal> {
    let block = read_block(text);

    let mut cell = [0.0f64; 6];
    for (value, tag) in cell.iter_mut().zip(CELL_TAGS) {
        let raw = block
            .items
            .get(tag)
            .ok_or_else(|| DataError::Parse(format!("Missing {}", tag)))?;
        *value = parse_cif_number(raw)
            .ok_or_else(|| DataError::Parse(format!("Invalid {}: '{}'", tag, raw)))?;
    }
    if let Some(bad) = cell[..3].iter().position(|&len| len <= 0.0) {
        return Err(DataError::Parse(format!(
            "{} must be positive, got {}",
            CELL_TAGS[bad], cell[bad]
        )));
    }
    if let Some(bad) = cell[3..].iter().position(|&angle| angle <= 0.0 || angle >= 180.0) {
        return Err(DataError::Parse(format!(
            "{} must lie in (0, 180), got {}",
            CELL_TAGS[bad + 3],
            cell[bad + 3]
        )));
    }
    let lattice = Lattice::from_parameters(cell[0], cell[1], cell[2], cell[3], cell[4], cell[5]);

    let ops = symmetry_operations(&block)?;
    let (species, frac_coords) = asymmetric_unit(&block)?;

    let mut full_species = Vec::with_capacity(species.len() * ops.len());
    let mut full_coords: Vec<[f64; 3]> = Vec::with_capacity(species.len() * ops.len());

    for (&z, frac) in species.iter().zip(&frac_coords) {
        for op in &ops {
            let position = wrap(op.apply(frac));
            if let Some(site) = full_coords
                .iter()
                .position(|existing| periodic_match(existing, &position))
            {
                if full_species[site] != z {
                    return Err(DataError::Parse(format!(
                        "Elements {} and {} share the site {:?}; disordered structures are not supported",
                        full_species[site], z, position
                    )));
                }
                continue;
            }
            full_species.push(z);
            full_coords.push(position);
        }
    }

    log::debug!(
        "CIF: {} asymmetric sites, {} symmetry operations, {} sites in cell",
        species.len(),
        ops.len(),
        full_species.len()
    );

    Crystal::new(lattice, full_species, full_coords)
}

/// Tag/value pairs and loops of one data block
#[derive(Debug, Default)]
struct CifBlock {
    items: HashMap<String, String>,
    loops: Vec<CifLoop>,
}

#[derive(Debug, Default)]
struct CifLoop {
    tags: Vec<String>,
    /// Row-major values, `tags.len()` per row
    values: Vec<String>,
}

impl CifLoop {
    fn column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }

    fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.values.chunks_exact(self.tags.len().max(1))
    }
}

impl CifBlock {
    fn find_loop(&self, tag: &str) -> Option<&CifLoop> {
        self.loops.iter().find(|l| l.column(tag).is_some())
    }

    fn close_loop(&mut self, current: &mut Option<CifLoop>) {
        if let Some(finished) = current.take() {
            if !finished.tags.is_empty() {
                self.loops.push(finished);
            }
        }
    }
}

/// Split the first data block into items and loops
fn read_block(text: &str) -> CifBlock {
    let mut block = CifBlock::default();
    let mut current_loop: Option<CifLoop> = None;
    let mut pending_tag: Option<String> = None;
    let mut text_field: Option<String> = None;
    let mut seen_data = false;

    for line in text.lines() {
        // Semicolon-delimited text fields
        if let Some(field) = text_field.as_mut() {
            if line.starts_with(';') {
                let value = std::mem::take(field);
                text_field = None;
                if let Some(tag) = pending_tag.take() {
                    block.items.insert(tag, value);
                } else if let Some(lp) = current_loop.as_mut() {
                    lp.values.push(value);
                }
            } else {
                if !field.is_empty() {
                    field.push('\n');
                }
                field.push_str(line);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix(';') {
            text_field = Some(rest.to_string());
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data_"))
        {
            if seen_data {
                break;
            }
            seen_data = true;
            continue;
        }

        if trimmed.eq_ignore_ascii_case("loop_") {
            block.close_loop(&mut current_loop);
            current_loop = Some(CifLoop::default());
            continue;
        }

        let tokens = tokenize(trimmed);

        if trimmed.starts_with('_') {
            let tag = tokens[0].to_lowercase();

            if let Some(lp) = current_loop.as_mut() {
                if lp.values.is_empty() {
                    lp.tags.extend(tokens.iter().map(|t| t.to_lowercase()));
                    continue;
                }
                block.close_loop(&mut current_loop);
            }

            if tokens.len() >= 2 {
                block.items.insert(tag, tokens[1..].join(" "));
            } else {
                pending_tag = Some(tag);
            }
            continue;
        }

        if let Some(tag) = pending_tag.take() {
            block.items.insert(tag, tokens.join(" "));
        } else if let Some(lp) = current_loop.as_mut() {
            lp.values.extend(tokens.into_iter().map(str::to_string));
        }
    }

    block.close_loop(&mut current_loop);
    block
}

/// Split a line into whitespace-separated values, honoring quotes
///
/// A quote only opens a value at the start of a token and only closes it
/// when followed by whitespace or the end of the line, so `O1'` stays intact.
fn tokenize(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        // An unquoted '#' starts a comment running to the end of the line
        if i >= bytes.len() || bytes[i] == b'#' {
            break;
        }

        let quote = bytes[i];
        if quote == b'\'' || quote == b'"' {
            let start = i + 1;
            let mut j = start;
            loop {
                if j >= bytes.len() {
                    tokens.push(&line[start..]);
                    i = bytes.len();
                    break;
                }
                if bytes[j] == quote && (j + 1 == bytes.len() || bytes[j + 1].is_ascii_whitespace())
                {
                    tokens.push(&line[start..j]);
                    i = j + 1;
                    break;
                }
                j += 1;
            }
        } else {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            tokens.push(&line[start..i]);
        }
    }

    tokens
}

/// Parse a CIF numeric value, dropping a standard uncertainty suffix
///
/// `"5.4307(2)"` -> 5.4307; `"."` and `"?"` are missing values.
fn parse_cif_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw == "." || raw == "?" {
        return None;
    }
    let value = raw.split('(').next().unwrap_or(raw);
    value.parse().ok()
}

fn symmetry_operations(block: &CifBlock) -> Result<Vec<SymOp>> {
    for tag in SYMOP_TAGS {
        if let Some(lp) = block.find_loop(tag) {
            let col = lp.column(tag).unwrap_or(0);
            let ops = lp
                .rows()
                .map(|row| SymOp::parse(&row[col]))
                .collect::<Result<Vec<_>>>()?;
            if !ops.is_empty() {
                return Ok(ops);
            }
        }
        if let Some(op) = block.items.get(tag) {
            return Ok(vec![SymOp::parse(op)?]);
        }
    }
    Ok(vec![SymOp::identity()])
}

/// Species and fractional coordinates of the listed sites
fn asymmetric_unit(block: &CifBlock) -> Result<(Vec<u32>, Vec<[f64; 3]>)> {
    let sites = block
        .find_loop("_atom_site_fract_x")
        .ok_or_else(|| DataError::Parse("Missing _atom_site_fract_x loop".into()))?;

    let coord_cols = ["_atom_site_fract_x", "_atom_site_fract_y", "_atom_site_fract_z"]
        .map(|tag| sites.column(tag));
    let [Some(x_col), Some(y_col), Some(z_col)] = coord_cols else {
        return Err(DataError::Parse(
            "atom_site loop lacks fractional coordinates".into(),
        ));
    };
    let species_col = sites
        .column("_atom_site_type_symbol")
        .or_else(|| sites.column("_atom_site_label"))
        .ok_or_else(|| DataError::Parse("atom_site loop lacks species column".into()))?;
    let occupancy_col = sites.column("_atom_site_occupancy");

    if sites.values.len() % sites.tags.len() != 0 {
        return Err(DataError::Parse(format!(
            "atom_site loop has {} values for {} columns",
            sites.values.len(),
            sites.tags.len()
        )));
    }

    let mut species = Vec::new();
    let mut coords = Vec::new();

    for row in sites.rows() {
        let token = &row[species_col];
        let z = infer_element(token)
            .and_then(atomic_number)
            .ok_or_else(|| DataError::Parse(format!("Unknown element '{}'", token)))?;

        let mut frac = [0.0; 3];
        for (value, col) in frac.iter_mut().zip([x_col, y_col, z_col]) {
            *value = parse_cif_number(&row[col]).ok_or_else(|| {
                DataError::Parse(format!("Invalid coordinate '{}' for '{}'", row[col], token))
            })?;
        }

        if let Some(col) = occupancy_col {
            // '?' and '.' mean unknown and count as fully occupied
            if let Some(occupancy) = parse_cif_number(&row[col]) {
                if occupancy < 1.0 - OCCUPANCY_TOLERANCE {
                    return Err(DataError::Parse(format!(
                        "Site '{}' has partial occupancy {}; disordered structures are not supported",
                        token, occupancy
                    )));
                }
            }
        }

        species.push(z);
        coords.push(frac);
    }

    if species.is_empty() {
        return Err(DataError::Parse("No atoms found in CIF".into()));
    }

    Ok((species, coords))
}

/// Map a fractional coordinate into [0, 1)
fn wrap(frac: [f64; 3]) -> [f64; 3] {
    frac.map(|x| {
        let w = x.rem_euclid(1.0);
        if w >= 1.0 - 1e-12 {
            0.0
        } else {
            w
        }
    })
}

fn periodic_match(a: &[f64; 3], b: &[f64; 3]) -> bool {
    a.iter().zip(b).all(|(x, y)| {
        let d = x - y;
        (d - d.round()).abs() < SITE_TOLERANCE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NACL_CIF: &str = "\
data_NaCl
_symmetry_space_group_name_H-M   'P 1'
_cell_length_a   5.6402(3)
_cell_length_b   5.6402
_cell_length_c   5.6402
_cell_angle_alpha   90
_cell_angle_beta   90
_cell_angle_gamma   90
loop_
 _symmetry_equiv_pos_site_id
 _symmetry_equiv_pos_as_xyz
  1  'x, y, z'
  2  'x, y+1/2, z+1/2'
  3  'x+1/2, y, z+1/2'
  4  'x+1/2, y+1/2, z'
loop_
 _atom_site_label
 _atom_site_type_symbol
 _atom_site_fract_x
 _atom_site_fract_y
 _atom_site_fract_z
 _atom_site_occupancy
  Na1  Na+  0.0  0.0  0.0  1
  Cl1  Cl-  0.5  0.5  0.5  1
";

    #[test]
    fn test_tokenize_quotes() {
        let tokens = tokenize("1 'x, y+1/2, z' O1' \"a b\"");
        assert_eq!(tokens, vec!["1", "x, y+1/2, z", "O1'", "a b"]);
    }

    #[test]
    fn test_parse_cif_number() {
        assert_eq!(parse_cif_number("5.6402(3)"), Some(5.6402));
        assert_eq!(parse_cif_number("90"), Some(90.0));
        assert_eq!(parse_cif_number("?"), None);
        assert_eq!(parse_cif_number("abc"), None);
    }

    #[test]
    fn test_parse_rock_salt() {
        let crystal = parse_cif_str(NACL_CIF).unwrap();
        assert_eq!(crystal.num_atoms(), 8);
        assert_eq!(&crystal.species[..4], &[11, 11, 11, 11]);
        assert_eq!(&crystal.species[4..], &[17, 17, 17, 17]);
        assert!((crystal.lattice.volume() - 5.6402f64.powi(3)).abs() < 1e-6);
        // Cl at (0.5, 0.5, 0.5) + (0, 1/2, 1/2) wraps to (0.5, 0, 0)
        assert!(crystal
            .frac_coords
            .iter()
            .any(|f| periodic_match(f, &[0.5, 0.0, 0.0])));
    }

    #[test]
    fn test_duplicate_positions_merged() {
        let cif = "\
data_Fe
_cell_length_a 2.87
_cell_length_b 2.87
_cell_length_c 2.87
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_space_group_symop_operation_xyz
'x, y, z'
'-x, -y, -z'
'x+1/2, y+1/2, z+1/2'
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Fe1 0 0 0
";
        let crystal = parse_cif_str(cif).unwrap();
        // Inversion maps the origin onto itself
        assert_eq!(crystal.species, vec![26, 26]);
    }

    #[test]
    fn test_text_fields_and_values_on_next_line() {
        let cif = "\
data_test
_publ_section_title
;
A title spanning
several lines
;
_cell_length_a
 3.0
_cell_length_b 3.0
_cell_length_c 3.0
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_atom_site_label _atom_site_fract_x _atom_site_fract_y
_atom_site_fract_z
Cu1 0.0 0.0
0.0
";
        let crystal = parse_cif_str(cif).unwrap();
        assert_eq!(crystal.species, vec![29]);
        assert!((crystal.lattice.matrix[0][0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_cell_is_parse_error() {
        let cif = "data_x\nloop_\n_atom_site_label\n_atom_site_fract_x\n_atom_site_fract_y\n_atom_site_fract_z\nNa 0 0 0\n";
        assert!(matches!(parse_cif_str(cif), Err(DataError::Parse(_))));
    }

    #[test]
    fn test_unknown_element_is_parse_error() {
        let cif = NACL_CIF.replace("Cl1  Cl-", "Qq1  Qq");
        assert!(matches!(parse_cif_str(&cif), Err(DataError::Parse(_))));
    }

    const DISORDERED_CIF: &str = "\
data_FeCo
_cell_length_a 2.86
_cell_length_b 2.86
_cell_length_c 2.86
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
_atom_site_occupancy
Fe1 Fe 0 0 0 0.5
Co1 Co 0 0 0 0.5
";

    #[test]
    fn test_partial_occupancy_is_parse_error() {
        assert!(matches!(
            parse_cif_str(DISORDERED_CIF),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_shared_site_is_parse_error() {
        // Occupancies dropped: two elements still land on one position
        let cif = DISORDERED_CIF.replace(" 0.5\n", " 1.0\n");
        let err = parse_cif_str(&cif).unwrap_err();
        assert!(matches!(err, DataError::Parse(ref msg) if msg.contains("share the site")));
    }

    #[test]
    fn test_unknown_occupancy_counts_as_full() {
        let cif = NACL_CIF.replace("0.5  0.5  0.5  1", "0.5  0.5  0.5  ?");
        assert_eq!(parse_cif_str(&cif).unwrap().num_atoms(), 8);
    }

    #[test]
    fn test_trailing_comments_and_case() {
        let cif = "\
DATA_Cu # header
_cell_length_a 3.0 # angstrom
_cell_length_b 3.0
_cell_length_c 3.0
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90#no space is part of the value
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Cu1 0.0 0.0 0.0 # origin
";
        let result = parse_cif_str(cif);
        // '90#no' is one token, so gamma is invalid
        assert!(matches!(result, Err(DataError::Parse(_))));

        let cif = cif.replace("90#no space is part of the value", "90");
        let crystal = parse_cif_str(&cif).unwrap();
        assert_eq!(crystal.species, vec![29]);
        assert!((crystal.lattice.volume() - 27.0).abs() < 1e-9);
        assert_eq!(tokenize("1.0 # note 'x'"), vec!["1.0"]);
    }

    #[test]
    fn test_second_data_block_ignored_case_insensitively() {
        let cif = format!("{}Data_second\n_cell_length_a 99\n", NACL_CIF);
        let crystal = parse_cif_str(&cif).unwrap();
        assert!((crystal.lattice.volume() - 5.6402f64.powi(3)).abs() < 1e-6);
    }

    #[test]
    fn test_non_positive_cell_is_parse_error() {
        for (from, to) in [
            ("_cell_length_a   5.6402(3)", "_cell_length_a -3.0"),
            ("_cell_length_b   5.6402", "_cell_length_b 0"),
            ("_cell_angle_beta   90", "_cell_angle_beta 180"),
        ] {
            let cif = NACL_CIF.replace(from, to);
            assert!(
                matches!(parse_cif_str(&cif), Err(DataError::Parse(_))),
                "accepted {}",
                to
            );
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = parse_cif_file("/nonexistent/structure.cif");
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
