//! Elements of `Z[w]` and their textual form.
//!
//! Stored generators are written the way the upstream tables print them:
//! highest degree first, unit coefficients elided, `*` between coefficient
//! and power, `^` for exponents (`-2*w^2 + w - 13`). Parsing accepts any
//! whitespace around the operators; formatting always emits the canonical
//! spacing so that re-encoded strings compare equal to stored ones.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char as pchar, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, opt},
    multi::many0,
    sequence::{delimited, preceded, tuple},
    IResult,
};

use crate::{FieldError, Result};

/// An element of the equation order, as coefficients of `1, w, w^2, ...`.
///
/// Values are always reduced by [`crate::NumberField`] so two equal elements
/// have identical coefficient vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldElement {
    pub(crate) coeffs: Vec<i128>,
}

impl FieldElement {
    pub fn coeffs(&self) -> &[i128] {
        &self.coeffs
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|c| *c == 0)
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn integer(input: &str) -> IResult<&str, i128> {
    map_res(digit1, |s: &str| s.parse::<i128>())(input)
}

fn exponent(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn power<'a>(var: &'a str) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    move |input: &'a str| {
        let (input, _) = tag(var)(input)?;
        let (input, exp) = opt(preceded(
            delimited(multispace0, pchar('^'), multispace0),
            exponent,
        ))(input)?;
        Ok((input, exp.unwrap_or(1)))
    }
}

fn term<'a>(var: &'a str) -> impl FnMut(&'a str) -> IResult<&'a str, (i128, u32)> {
    move |input: &'a str| {
        alt((
            map(
                tuple((
                    integer,
                    opt(preceded(
                        delimited(multispace0, pchar('*'), multispace0),
                        power(var),
                    )),
                )),
                |(c, e)| (c, e.unwrap_or(0)),
            ),
            map(power(var), |e| (1, e)),
        ))(input)
    }
}

fn expression<'a>(var: &'a str) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<(i128, u32)>> {
    move |input: &'a str| {
        let (input, _) = multispace0(input)?;
        let (input, lead) = opt(pchar('-'))(input)?;
        let (input, _) = multispace0(input)?;
        let (input, (c0, e0)) = term(var)(input)?;
        let (input, rest) = many0(tuple((
            delimited(multispace0, one_of("+-"), multispace0),
            term(var),
        )))(input)?;
        let (input, _) = multispace0(input)?;

        let mut terms = Vec::with_capacity(rest.len() + 1);
        terms.push((if lead.is_some() { -c0 } else { c0 }, e0));
        for (sign, (c, e)) in rest {
            terms.push((if sign == '-' { -c } else { c }, e));
        }
        Ok((input, terms))
    }
}

/// Parse a polynomial expression in `var` into `(coefficient, exponent)`
/// terms. Repeated exponents are allowed; the caller sums them.
pub fn parse_terms(text: &str, var: &str) -> Result<Vec<(i128, u32)>> {
    if var.is_empty() {
        return Err(FieldError::BadElement {
            text: text.to_string(),
            reason: "empty generator name".to_string(),
        });
    }
    match all_consuming(expression(var))(text) {
        Ok((_, terms)) => Ok(terms),
        Err(err) => Err(FieldError::BadElement {
            text: text.to_string(),
            reason: match err {
                nom::Err::Error(e) | nom::Err::Failure(e) => {
                    format!("unexpected input at `{}`", e.input)
                }
                nom::Err::Incomplete(_) => "incomplete input".to_string(),
            },
        }),
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Format power-basis coefficients in the stored style.
pub fn format_terms(coeffs: &[i128], var: &str) -> String {
    let mut out = String::new();
    for (i, &c) in coeffs.iter().enumerate().rev() {
        if c == 0 {
            continue;
        }
        let mag = c.unsigned_abs();
        if out.is_empty() {
            if c < 0 {
                out.push('-');
            }
        } else if c < 0 {
            out.push_str(" - ");
        } else {
            out.push_str(" + ");
        }
        if i == 0 {
            out.push_str(&mag.to_string());
            continue;
        }
        if mag != 1 {
            out.push_str(&format!("{mag}*"));
        }
        out.push_str(var);
        if i > 1 {
            out.push_str(&format!("^{i}"));
        }
    }
    if out.is_empty() {
        "0".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_generators() {
        assert_eq!(parse_terms("w + 12", "w").unwrap(), vec![(1, 1), (12, 0)]);
        assert_eq!(
            parse_terms("-2*w^2 + w - 13", "w").unwrap(),
            vec![(-2, 2), (1, 1), (-13, 0)]
        );
        assert_eq!(parse_terms("  7 ", "w").unwrap(), vec![(7, 0)]);
        assert_eq!(parse_terms("-w", "a").is_err(), true);
        assert_eq!(parse_terms("3 * a ^ 2", "a").unwrap(), vec![(3, 2)]);
    }

    #[test]
    fn rejects_rational_coefficients() {
        let err = parse_terms("1/2*w + 1", "w").unwrap_err();
        assert!(matches!(err, FieldError::BadElement { .. }));
    }

    #[test]
    fn formats_in_stored_style() {
        assert_eq!(format_terms(&[12, 1], "w"), "w + 12");
        assert_eq!(format_terms(&[4, -1], "w"), "-w + 4");
        assert_eq!(format_terms(&[-13, 1, -2], "w"), "-2*w^2 + w - 13");
        assert_eq!(format_terms(&[0, 0], "w"), "0");
        assert_eq!(format_terms(&[-1, 2], "w"), "2*w - 1");
    }
}
