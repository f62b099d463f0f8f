use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 102, g: 187, b: 255 };
pub const SECONDARY: Color = Color::TrueColor { r: 170, g: 130, b: 255 };
pub const ACCENT: Color = Color::TrueColor { r: 255, g: 200, b: 87 };
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

pub const IPV4_ADDR: Color = Color::TrueColor { r: 120, g: 220, b: 160 };
pub const IPV4_PREFIX: Color = Color::TrueColor { r: 80, g: 160, b: 120 };
pub const MAC_ADDR: Color = Color::TrueColor { r: 240, g: 150, b: 200 };

pub const PASS: Color = Color::Green;
pub const WARN: Color = Color::Yellow;
pub const FAIL: Color = Color::Red;
pub const SKIPPED: Color = Color::BrightBlack;
