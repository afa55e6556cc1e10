//! Mesh validation for 3D printing
//!
//! Checks an indexed mesh for:
//! - Degenerate triangles (zero area)
//! - NaN/Inf coordinates
//! - Normals that are not unit length
//! - Open, non-manifold or inconsistently wound edges

use std::collections::HashMap;

use super::Mesh;

/// Result of mesh validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Total number of triangles validated
    pub total: usize,
    /// Number of degenerate triangles (zero or near-zero area)
    pub degenerate: usize,
    /// Number of triangles with invalid coordinates (NaN/Inf)
    pub invalid_coords: usize,
    /// Number of triangles whose stored normal is not unit length
    pub invalid_normal: usize,
    /// Edges used by only one triangle
    pub boundary_edges: usize,
    /// Edges used by more than two triangles
    pub non_manifold_edges: usize,
    /// Edges traversed twice in the same direction
    pub inconsistent_edges: usize,
    /// Warning messages for issues found
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Closed, 2-manifold and consistently oriented
    pub fn is_watertight(&self) -> bool {
        self.total > 0
            && self.boundary_edges == 0
            && self.non_manifold_edges == 0
            && self.inconsistent_edges == 0
    }

    /// Check if the mesh has any issues at all
    pub fn has_issues(&self) -> bool {
        self.degenerate > 0 || self.invalid_coords > 0 || self.invalid_normal > 0 || !self.is_watertight()
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            format!("Mesh valid: {} triangles, watertight", self.total)
        } else {
            format!(
                "Mesh issues: {} total, {} degenerate, {} invalid coords, {} bad normals, \
                 {} open edges, {} non-manifold edges, {} flipped edges",
                self.total,
                self.degenerate,
                self.invalid_coords,
                self.invalid_normal,
                self.boundary_edges,
                self.non_manifold_edges,
                self.inconsistent_edges
            )
        }
    }
}

/// Minimum area threshold for non-degenerate triangles (in square mm)
const MIN_TRIANGLE_AREA: f32 = 1e-10;

/// Validate a mesh and return a detailed report
pub fn validate_mesh(mesh: &Mesh) -> ValidationResult {
    let mut result = ValidationResult {
        total: mesh.triangles.len(),
        ..Default::default()
    };

    for (i, tri) in mesh.iter_triangles().enumerate() {
        if has_invalid_coords(&tri.vertices, &tri.normal) {
            result.invalid_coords += 1;
            result
                .warnings
                .push(format!("Triangle {} has NaN/Inf coordinates", i));
            continue;
        }

        if triangle_area(&tri.vertices) < MIN_TRIANGLE_AREA {
            result.degenerate += 1;
        }

        if !is_normal_valid(&tri.normal) {
            result.invalid_normal += 1;
        }
    }

    // Directed edge -> use count
    let mut edges: HashMap<(u32, u32), u32> = HashMap::with_capacity(mesh.triangles.len() * 3);
    for &[a, b, c] in &mesh.triangles {
        for edge in [(a, b), (b, c), (c, a)] {
            *edges.entry(edge).or_default() += 1;
        }
    }
    for (&(a, b), &forward) in &edges {
        let backward = edges.get(&(b, a)).copied().unwrap_or(0);
        // Visit each undirected edge once
        if (a, b) > (b, a) && backward > 0 {
            continue;
        }
        match forward + backward {
            1 => result.boundary_edges += 1,
            2 if forward == 1 => {}
            2 => result.inconsistent_edges += 1,
            _ => result.non_manifold_edges += 1,
        }
    }

    if result.degenerate > 0 {
        result.warnings.push(format!(
            "{} degenerate triangles detected",
            result.degenerate
        ));
    }
    if result.boundary_edges > 0 {
        result.warnings.push(format!(
            "{} open edges, mesh is not watertight",
            result.boundary_edges
        ));
    }
    if result.non_manifold_edges > 0 || result.inconsistent_edges > 0 {
        result.warnings.push(format!(
            "{} non-manifold and {} inconsistently wound edges",
            result.non_manifold_edges, result.inconsistent_edges
        ));
    }

    result
}

/// Check if a triangle has any invalid (NaN/Inf) coordinates
fn has_invalid_coords(vertices: &[[f32; 3]; 3], normal: &[f32; 3]) -> bool {
    vertices.iter().flatten().chain(normal).any(|c| !c.is_finite())
}

/// Calculate the area of a triangle from its vertices
fn triangle_area(vertices: &[[f32; 3]; 3]) -> f32 {
    let v0 = vertices[0];
    let v1 = vertices[1];
    let v2 = vertices[2];

    let edge_a = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let edge_b = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

    let cx = edge_a[1] * edge_b[2] - edge_a[2] * edge_b[1];
    let cy = edge_a[2] * edge_b[0] - edge_a[0] * edge_b[2];
    let cz = edge_a[0] * edge_b[1] - edge_a[1] * edge_b[0];

    0.5 * (cx * cx + cy * cy + cz * cz).sqrt()
}

/// Check if a normal vector is valid (unit length, not zero/NaN)
fn is_normal_valid(normal: &[f32; 3]) -> bool {
    let len_sq = normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2];
    len_sq.is_finite() && (0.99..=1.01).contains(&len_sq)
}
