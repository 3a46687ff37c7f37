//! Element symbol to atomic number lookup
//!
//! CIF files name species by symbol (`Fe`, `O2-`) or by site label
//! (`Fe1`, `O3a`); the graph builder needs atomic numbers.

use std::collections::HashMap;

/// Element symbols ordered by atomic number (index 0 is hydrogen)
pub const ELEMENT_SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

lazy_static::lazy_static! {
    static ref SYMBOL_TO_Z: HashMap<&'static str, u32> = ELEMENT_SYMBOLS
        .iter()
        .enumerate()
        .map(|(i, &symbol)| (symbol, i as u32 + 1))
        .collect();
}

/// Atomic number for an exact element symbol (`"Fe"` -> 26)
pub fn atomic_number(symbol: &str) -> Option<u32> {
    SYMBOL_TO_Z.get(symbol).copied()
}

/// Element symbol for an atomic number
pub fn element_symbol(z: u32) -> Option<&'static str> {
    ELEMENT_SYMBOLS.get((z as usize).checked_sub(1)?).copied()
}

/// Infer the element from a CIF species token
///
/// Strips oxidation states and site suffixes (`"Fe2+"`, `"O1"`, `"Na1a"`)
/// and normalizes case (`"CL"` -> `"Cl"`). Two-letter symbols win over
/// one-letter ones when both are valid.
pub fn infer_element(token: &str) -> Option<&'static str> {
    let letters: Vec<char> = token
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    if letters.is_empty() {
        return None;
    }

    let first = letters[0].to_ascii_uppercase();

    if letters.len() >= 2 {
        let two: String = [first, letters[1].to_ascii_lowercase()].iter().collect();
        if let Some((&symbol, _)) = SYMBOL_TO_Z.get_key_value(two.as_str()) {
            return Some(symbol);
        }
    }

    let one = first.to_string();
    SYMBOL_TO_Z
        .get_key_value(one.as_str())
        .map(|(&symbol, _)| symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_number() {
        assert_eq!(atomic_number("H"), Some(1));
        assert_eq!(atomic_number("Fe"), Some(26));
        assert_eq!(atomic_number("Og"), Some(118));
        assert_eq!(atomic_number("Xx"), None);
    }

    #[test]
    fn test_element_symbol() {
        assert_eq!(element_symbol(8), Some("O"));
        assert_eq!(element_symbol(0), None);
        assert_eq!(element_symbol(119), None);
    }

    #[test]
    fn test_infer_element() {
        assert_eq!(infer_element("Fe2+"), Some("Fe"));
        assert_eq!(infer_element("O2-"), Some("O"));
        assert_eq!(infer_element("Na1"), Some("Na"));
        assert_eq!(infer_element("CL"), Some("Cl"));
        assert_eq!(infer_element("Ca1a"), Some("Ca"));
        // "Oa" is not an element, fall back to oxygen
        assert_eq!(infer_element("Oa1"), Some("O"));
        assert_eq!(infer_element("123"), None);
    }
}
