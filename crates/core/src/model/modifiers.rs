//! Access flag keywords recognised in `.class`, `.field` and `.method` headers.
//! See https://source.android.com/devices/tech/dalvik/dex-format#access-flags

const ACCESS_FLAGS: &[(&str, u32)] = &[
    ("public", 0x0001),
    ("private", 0x0002),
    ("protected", 0x0004),
    ("static", 0x0008),
    ("final", 0x0010),
    ("synchronized", 0x0020),
    ("volatile", 0x0040),
    ("bridge", 0x0040),
    ("transient", 0x0080),
    ("varargs", 0x0080),
    ("native", 0x0100),
    ("interface", 0x0200),
    ("abstract", 0x0400),
    ("strictfp", 0x0800),
    ("synthetic", 0x1000),
    ("annotation", 0x2000),
    ("enum", 0x4000),
    ("constructor", 0x10000),
    ("declared-synchronized", 0x20000),
];

pub fn is_modifier(token: &str) -> bool {
    ACCESS_FLAGS.iter().any(|(name, _)| *name == token)
}

pub fn access_flag(token: &str) -> Option<u32> {
    ACCESS_FLAGS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, flag)| *flag)
}

/// Combined access flags of a modifier list; unknown tokens contribute nothing.
pub fn access_flags<S: AsRef<str>>(modifiers: &[S]) -> u32 {
    modifiers
        .iter()
        .filter_map(|m| access_flag(m.as_ref()))
        .fold(0, |acc, flag| acc | flag)
}
