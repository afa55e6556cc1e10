/// Boundary samples of a `width x height` grid, counter-clockwise seen from +z
///
/// Starts at (0, 0) and walks the bottom edge (+x), right edge (+y), top edge
/// (-x) and left edge (-y). Each corner appears once, so consecutive entries
/// (wrapping around) are the `2 (width - 1) + 2 (height - 1)` perimeter edges.
pub fn perimeter(width: usize, height: usize) -> Vec<(usize, usize)> {
    if width < 2 || height < 2 {
        return Vec::new();
    }
    let (last_i, last_j) = (width - 1, height - 1);

    let bottom = (0..last_i).map(|i| (i, 0));
    let right = (0..last_j).map(|j| (last_i, j));
    let top = (1..=last_i).rev().map(|i| (i, last_j));
    let left = (1..=last_j).rev().map(|j| (0, j));

    bottom.chain(right).chain(top).chain(left).collect()
}
