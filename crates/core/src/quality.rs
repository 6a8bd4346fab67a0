// Translation size heuristic
//
// A translation much shorter than its source usually means the backend stopped
// early or summarized. This is only a signal: the caller logs it and still
// keeps the output.

use serde::Serialize;

/// Output/input length comparison for one unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeCheck {
    pub input_chars: usize,
    pub output_chars: usize,
    pub ratio: f64,
    pub passed: bool,
}

/// `output_chars / input_chars`; 0.0 for an empty input
pub fn size_ratio(input: &str, output: &str) -> f64 {
    let input_chars = input.chars().count();
    if input_chars == 0 {
        return 0.0;
    }
    output.chars().count() as f64 / input_chars as f64
}

/// Compare sizes against a minimum ratio
pub fn check_size(input: &str, output: &str, min_ratio: f64) -> SizeCheck {
    let ratio = size_ratio(input, output);
    SizeCheck {
        input_chars: input.chars().count(),
        output_chars: output.chars().count(),
        ratio,
        passed: ratio >= min_ratio,
    }
}
