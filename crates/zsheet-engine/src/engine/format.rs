/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NAN!".to_string()
    } else if n.is_infinite() {
        "#INF!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e10 {
        format!("{:.0}", n)
    } else {
        format!("{:.2}", n)
    }
}

/// Format a number with two decimals and `,` thousands separators (`1,234.50`).
pub fn format_grouped(n: f64) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if n < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(1.5), "1.50");
        assert_eq!(format_number(f64::NAN), "#NAN!");
        assert_eq!(format_number(1e12), "1000000000000.00");
    }

    #[test]
    fn test_format_grouped() {
        assert_eq!(format_grouped(0.0), "0.00");
        assert_eq!(format_grouped(999.5), "999.50");
        assert_eq!(format_grouped(1234.5), "1,234.50");
        assert_eq!(format_grouped(-1234567.891), "-1,234,567.89");
        assert_eq!(format_grouped(-0.001), "0.00");
    }
}
