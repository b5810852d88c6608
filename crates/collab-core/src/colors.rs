//! Deterministic display colors derived from collaborator identities.
//!
//! Every client must independently derive the same color for the same
//! identity, so the color is a pure function of the identity string:
//! FNV-1a hash selects a hue, saturation and lightness are fixed for
//! vivid but readable avatars and chat bubbles.

/// Derive a stable `#rrggbb` hex color from an identity string.
pub fn identity_color(identity: &str) -> String {
    let hash = fnv1a_hash(identity);
    let hue = ((hash % 360) as f32) / 360.0;
    let saturation = 0.7;
    let lightness = 0.6;

    let (r, g, b) = hsl_to_rgb(hue, saturation, lightness);
    format!(
        "#{:02x}{:02x}{:02x}",
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8
    )
}

/// FNV-1a 64-bit hash.
fn fnv1a_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l); // Achromatic
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (r, g, b)
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_stable() {
        assert_eq!(
            identity_color("alice@example.com"),
            identity_color("alice@example.com")
        );
    }

    #[test]
    fn test_distinct_identities_get_distinct_colors() {
        assert_ne!(
            identity_color("alice@example.com"),
            identity_color("bob@example.com")
        );
    }

    #[test]
    fn test_color_is_hex_rgb() {
        let color = identity_color("carol@example.com");
        assert_eq!(color.len(), 7);
        assert!(color.starts_with('#'));
        assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
