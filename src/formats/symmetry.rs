//! Crystallographic symmetry operations in `x,y,z` notation
//!
//! Parses strings such as `"-x+1/2, y, z+0.5"` into an affine map acting on
//! fractional coordinates.

use crate::error::{DataError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymOp {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

impl SymOp {
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// Parse a triplet like `"x, y+1/2, -z"`
    pub fn parse(op: &str) -> Result<Self> {
        let op = op.trim().trim_matches(|c| c == '\'' || c == '"');
        let parts: Vec<&str> = op.split(',').collect();
        if parts.len() != 3 {
            return Err(DataError::Parse(format!(
                "Symmetry operation must have 3 components: '{}'",
                op
            )));
        }

        let mut rotation = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for (i, part) in parts.iter().enumerate() {
            let (row, shift) = parse_component(part)
                .map_err(|e| DataError::Parse(format!("In symmetry operation '{}': {}", op, e)))?;
            rotation[i] = row;
            translation[i] = shift;
        }

        Ok(Self {
            rotation,
            translation,
        })
    }

    /// Apply to a fractional coordinate
    pub fn apply(&self, frac: &[f64; 3]) -> [f64; 3] {
        let mut out = self.translation;
        for (i, row) in self.rotation.iter().enumerate() {
            out[i] += row[0] * frac[0] + row[1] * frac[1] + row[2] * frac[2];
        }
        out
    }
}

/// Parse one component (`"-x+1/2"`) into its coefficient row and shift
fn parse_component(expr: &str) -> std::result::Result<([f64; 3], f64), String> {
    let chars: Vec<char> = expr
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if chars.is_empty() {
        return Err("empty component".to_string());
    }

    let mut row = [0.0; 3];
    let mut shift = 0.0;
    let mut pos = 0;

    while pos < chars.len() {
        let mut sign = 1.0;
        match chars[pos] {
            '+' => pos += 1,
            '-' => {
                sign = -1.0;
                pos += 1;
            }
            _ => {}
        }

        let start = pos;
        while pos < chars.len()
            && (chars[pos].is_ascii_digit() || chars[pos] == '.' || chars[pos] == '/')
        {
            pos += 1;
        }
        let coefficient = if pos > start {
            let literal: String = chars[start..pos].iter().collect();
            Some(parse_number(&literal)?)
        } else {
            None
        };

        if chars.get(pos) == Some(&'*') {
            pos += 1;
        }

        let axis = match chars.get(pos) {
            Some('x') => Some(0),
            Some('y') => Some(1),
            Some('z') => Some(2),
            _ => None,
        };

        match (coefficient, axis) {
            (c, Some(axis)) => {
                row[axis] += sign * c.unwrap_or(1.0);
                pos += 1;
            }
            (Some(c), None) => shift += sign * c,
            (None, None) => {
                return Err(format!("unexpected token at '{}'", expr.trim()));
            }
        }
    }

    Ok((row, shift))
}

/// Parse `"0.5"` or `"1/2"`
fn parse_number(literal: &str) -> std::result::Result<f64, String> {
    let bad = || format!("invalid number '{}'", literal);
    match literal.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().map_err(|_| bad())?;
            let den: f64 = den.parse().map_err(|_| bad())?;
            if den == 0.0 {
                return Err(bad());
            }
            Ok(num / den)
        }
        None => literal.parse().map_err(|_| bad()),
    }
}
