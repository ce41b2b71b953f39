//! Minimal printf format-string lexer.
//!
//! Only what the `%s` bound check needs is extracted: the conversion
//! character, which data argument it consumes, its precision and whether
//! the `l` length modifier makes it a wide-string conversion.

use std::sync::OnceLock;

use regex::Regex;

const SPECIFIER_PATTERN: &str = r"%(?:(?P<pos>[1-9][0-9]*)\$)?(?P<flags>[-+ #0']*)(?P<width>\*(?:[1-9][0-9]*\$)?|[0-9]+)?(?:\.(?P<prec>\*(?:(?P<prec_pos>[1-9][0-9]*)\$)?|[0-9]*))?(?P<len>hh|h|ll|l|j|z|t|L|q)?(?P<conv>[a-zA-Z%])";

fn specifier_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SPECIFIER_PATTERN).ok()).as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    NotSpecified,
    Constant(u64),
    /// Taken from a data argument (`.*`), 0-based among the data arguments.
    DataArg(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub conversion: char,
    /// 0-based index among the arguments following the format string.
    pub arg_index: usize,
    pub precision: Precision,
    /// `%ls`: the argument is a wide string.
    pub wide: bool,
}

impl FormatSpec {
    pub fn is_string(&self) -> bool {
        self.conversion == 's'
    }
}

/// Data-argument index of a `*` amount, consuming the next sequential slot
/// unless an explicit `n$` position is given.
fn star_index(text: &str, next_arg: &mut usize) -> usize {
    let positional = text
        .strip_prefix('*')
        .and_then(|rest| rest.strip_suffix('$'))
        .and_then(|digits| digits.parse::<usize>().ok());
    match positional {
        Some(position) => position - 1,
        None => {
            let index = *next_arg;
            *next_arg += 1;
            index
        }
    }
}

/// Lexes every conversion specification in `format`, in order. With
/// `is_kprintf`, the kernel `%b` and `%D` conversions take a second
/// argument (the bit-name or separator string) after their value.
pub fn parse_printf(format: &str, is_kprintf: bool) -> Vec<FormatSpec> {
    let Some(re) = specifier_regex() else {
        return Vec::new();
    };
    let mut specs = Vec::new();
    let mut next_arg = 0usize;
    for caps in re.captures_iter(format) {
        let conversion = caps
            .name("conv")
            .and_then(|m| m.as_str().chars().next())
            .unwrap_or('%');
        if conversion == '%' {
            continue;
        }
        if let Some(width) = caps.name("width") {
            if width.as_str().starts_with('*') {
                star_index(width.as_str(), &mut next_arg);
            }
        }
        let precision = match caps.name("prec").map(|m| m.as_str()) {
            None => Precision::NotSpecified,
            Some(text) if text.starts_with('*') => {
                Precision::DataArg(star_index(text, &mut next_arg))
            }
            Some(digits) => Precision::Constant(digits.parse().unwrap_or(0)),
        };
        let arg_index = match caps
            .name("pos")
            .and_then(|m| m.as_str().parse::<usize>().ok())
        {
            Some(position) => position - 1,
            None => {
                let index = next_arg;
                next_arg += 1;
                index
            }
        };
        if is_kprintf && matches!(conversion, 'b' | 'D') {
            next_arg += 1;
        }
        let wide = caps.name("len").is_some_and(|m| m.as_str() == "l");
        specs.push(FormatSpec {
            conversion,
            arg_index,
            precision,
            wide,
        });
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_arguments() {
        let specs = parse_printf("%d, %s and %5.2f%%", false);
        let summary: Vec<_> = specs.iter().map(|s| (s.conversion, s.arg_index)).collect();
        assert_eq!(summary, vec![('d', 0), ('s', 1), ('f', 2)]);
        assert_eq!(specs[2].precision, Precision::Constant(2));
    }

    #[test]
    fn star_amounts_consume_arguments() {
        let specs = parse_printf("%*.*s %s", false);
        assert_eq!(specs[0].precision, Precision::DataArg(1));
        assert_eq!(specs[0].arg_index, 2);
        assert_eq!(specs[1].arg_index, 3);
    }

    #[test]
    fn positional_arguments() {
        let specs = parse_printf("%2$s %1$.*3$s", false);
        assert_eq!(specs[0].arg_index, 1);
        assert_eq!(specs[1].arg_index, 0);
        assert_eq!(specs[1].precision, Precision::DataArg(2));
    }

    #[test]
    fn wide_and_empty_precision() {
        let specs = parse_printf("%ls %.s %hhd", false);
        assert!(specs[0].wide);
        assert_eq!(specs[1].precision, Precision::Constant(0));
        assert!(!specs[2].wide);
        assert_eq!(specs[2].conversion, 'd');
    }

    #[test]
    fn kernel_conversions_take_a_description_argument() {
        let kernel = parse_printf("%b %s", true);
        assert_eq!(kernel[1].arg_index, 2);
        let kernel = parse_printf("%D %s", true);
        assert_eq!(kernel[1].arg_index, 2);

        let plain = parse_printf("%b %s", false);
        assert_eq!(plain[1].arg_index, 1);
    }
}
