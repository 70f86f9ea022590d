/// Fixed seat palette, assigned first-free in order. A color frees up when
/// its holder leaves and the whole set resets on a rematch.
pub const PALETTE: [&str; 8] = [
    "#FF0000", "#0000FF", "#00FF00", "#FFFF00", "#FF00FF", "#00FFFF", "#FFA500", "#800080",
];

/// Lowest palette entry not currently in use.
pub fn next_free(used: &[String]) -> Option<&'static str> {
    PALETTE
        .iter()
        .copied()
        .find(|c| !used.iter().any(|u| u == c))
}
