use conscript_core::{
    Console,
    val,
    vm::{Callback, ObjectRef},
};

pub fn register(console: &mut Console) {
    console.mark_group(None, "Math", Some("float helpers"));
    console.add_command(None, "mAbs", Callback::Float(m_abs), "mAbs(value)", 2, 2);
    console.add_command(None, "mFloor", Callback::Int(m_floor), "mFloor(value)", 2, 2);
    console.add_command(None, "mCeil", Callback::Int(m_ceil), "mCeil(value)", 2, 2);
    console.add_command(None, "mSqrt", Callback::Float(m_sqrt), "mSqrt(value)", 2, 2);
    console.add_command(None, "mPow", Callback::Float(m_pow), "mPow(base, exponent)", 3, 3);
    console.add_command(None, "mClamp", Callback::Float(m_clamp), "mClamp(value, min, max)", 4, 4);
    console.add_command(None, "isEven", Callback::Bool(is_even), "isEven(int)", 2, 2);
}

fn arg(argv: &[String], at: usize) -> f64 {
    val::parse_float(&argv[at])
}

fn m_abs(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> f64 {
    arg(argv, 1).abs()
}

fn m_floor(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    arg(argv, 1).floor() as i32
}

fn m_ceil(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> i32 {
    arg(argv, 1).ceil() as i32
}

/// Negative input yields 0 rather than NaN.
fn m_sqrt(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> f64 {
    arg(argv, 1).max(0.0).sqrt()
}

fn m_pow(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> f64 {
    arg(argv, 1).powf(arg(argv, 2))
}

fn m_clamp(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> f64 {
    let (value, low, high) = (arg(argv, 1), arg(argv, 2), arg(argv, 3));
    if low > high { low } else { value.clamp(low, high) }
}

fn is_even(_: &mut Console, _: Option<&ObjectRef>, argv: &[String]) -> bool {
    val::parse_int(&argv[1]) % 2 == 0
}
