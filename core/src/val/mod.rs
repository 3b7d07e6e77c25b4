//! Coercions between the three script value channels: 32-bit integers,
//! doubles and strings.
//!
//! Strings convert to numbers by reading the longest numeric prefix, so
//! `"12abc"` is 12 and `"abc"` is 0. The words `true` and `false` count as 1
//! and 0. Floats print `%g`-style with six significant digits.


/// Read a signed decimal integer prefix, wrapping on overflow.
pub fn parse_int(s: &str) -> i32 {
    if let Some(b) = parse_bool_word(s) {
        return b as i32;
    }
    let bytes = s.trim_start().as_bytes();
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    let mut acc: i64 = 0;
    for &b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        acc = acc.wrapping_mul(10).wrapping_add((b - b'0') as i64);
    }
    let value = if negative { acc.wrapping_neg() } else { acc };
    value as i32
}

/// Read a decimal float prefix (`[sign]digits[.digits][e[sign]digits]`).
pub fn parse_float(s: &str) -> f64 {
    if let Some(b) = parse_bool_word(s) {
        return if b { 1.0 } else { 0.0 };
    }
    let text = s.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0usize;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-' | b'+')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    text[..end].parse::<f64>().unwrap_or(0.0)
}

/// `true`/`false` in any case, otherwise any non-zero number.
pub fn parse_bool(s: &str) -> bool {
    match parse_bool_word(s) {
        Some(b) => b,
        None => parse_float(s) != 0.0,
    }
}

fn parse_bool_word(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn format_int(value: i32) -> String {
    let mut buf = itoa::Buffer::new();
    buf.format(value).to_owned()
}

pub fn push_int(out: &mut String, value: i32) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(value));
}

/// `%g` formatting with six significant digits.
pub fn format_float(value: f64) -> String {
    let mut out = String::new();
    push_float(&mut out, value);
    out
}

pub fn push_float(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("nan");
        return;
    }
    if value.is_infinite() {
        out.push_str(if value < 0.0 { "-inf" } else { "inf" });
        return;
    }
    if value == 0.0 {
        out.push('0');
        return;
    }
    const PRECISION: i32 = 6;
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exponent < -4 || exponent >= PRECISION {
        out.push_str(trim_fraction(mantissa));
        out.push('e');
        out.push(if exponent < 0 { '-' } else { '+' });
        let magnitude = exponent.unsigned_abs();
        if magnitude < 10 {
            out.push('0');
        }
        out.push_str(&magnitude.to_string());
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, value);
        out.push_str(trim_fraction(&fixed));
    }
}

fn trim_fraction(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}
