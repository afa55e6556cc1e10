/// A triangle for STL output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Three vertices: [[x, y, z], [x, y, z], [x, y, z]]
    pub vertices: [[f32; 3]; 3],
    /// Normal vector [nx, ny, nz]
    pub normal: [f32; 3],
}

impl Triangle {
    /// Create a new triangle and calculate its normal
    pub fn new(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> Self {
        Self {
            vertices: [v0, v1, v2],
            normal: calculate_normal(v0, v1, v2),
        }
    }

    /// Create a triangle with a pre-calculated normal
    pub fn with_normal(vertices: [[f32; 3]; 3], normal: [f32; 3]) -> Self {
        Self { vertices, normal }
    }
}

/// Calculate the normal vector for a triangle using the cross product
///
/// Counter-clockwise vertex order gives the outward normal.
pub fn calculate_normal(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> [f32; 3] {
    // Edge vectors
    let u = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let v = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

    // Cross product
    let nx = u[1] * v[2] - u[2] * v[1];
    let ny = u[2] * v[0] - u[0] * v[2];
    let nz = u[0] * v[1] - u[1] * v[0];

    // Normalize
    let len = (nx * nx + ny * ny + nz * nz).sqrt();
    if len > 1e-10 {
        [nx / len, ny / len, nz / len]
    } else {
        [0.0, 0.0, 1.0] // Default to up for degenerate triangles
    }
}

/// Indexed triangle mesh with one normal per triangle
///
/// Coordinates are in mm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
    pub normals: Vec<[f32; 3]>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Resolve triangle `i` into positions plus its stored normal
    pub fn triangle(&self, i: usize) -> Triangle {
        let [a, b, c] = self.triangles[i];
        Triangle::with_normal(
            [
                self.vertices[a as usize],
                self.vertices[b as usize],
                self.vertices[c as usize],
            ],
            self.normals[i],
        )
    }

    /// Iterate over all triangles in stored order
    pub fn iter_triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.triangles.len()).map(|i| self.triangle(i))
    }

    /// Triangle count, vertex count and bounding box
    pub fn stats(&self) -> MeshStats {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for v in &self.vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        if self.vertices.is_empty() {
            min = [0.0; 3];
            max = [0.0; 3];
        }
        MeshStats {
            triangle_count: self.triangles.len(),
            vertex_count: self.vertices.len(),
            min,
            max,
        }
    }
}

/// Summary handed to the UI after a build
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshStats {
    pub triangle_count: usize,
    pub vertex_count: usize,
    /// Bounding box minimum corner
    pub min: [f32; 3],
    /// Bounding box maximum corner
    pub max: [f32; 3],
}

impl MeshStats {
    /// Bounding box size along X, Y and Z
    pub fn extents(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Accumulator for building indexed triangle meshes
#[derive(Debug, Default)]
pub struct MeshBuilder {
    mesh: Mesh,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            mesh: Mesh {
                vertices: Vec::with_capacity(vertices),
                triangles: Vec::with_capacity(triangles),
                normals: Vec::with_capacity(triangles),
            },
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, v: [f32; 3]) -> u32 {
        self.mesh.vertices.push(v);
        (self.mesh.vertices.len() - 1) as u32
    }

    /// Add a triangle from three vertex indices, computing its normal
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        let v = &self.mesh.vertices;
        let normal = calculate_normal(v[a as usize], v[b as usize], v[c as usize]);
        self.mesh.triangles.push([a, b, c]);
        self.mesh.normals.push(normal);
    }

    /// Add a quad (two triangles) from four vertex indices
    /// Vertices should be in counter-clockwise order when viewed from outside
    pub fn add_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.add_triangle(a, b, c);
        self.add_triangle(a, c, d);
    }

    /// Add triangles from another collection
    pub fn extend(&mut self, triangles: impl IntoIterator<Item = [u32; 3]>) {
        for [a, b, c] in triangles {
            self.add_triangle(a, b, c);
        }
    }

    /// Consume the builder and return the mesh
    pub fn finish(self) -> Mesh {
        self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_normal() {
        // A triangle in the XY plane should have a Z-pointing normal
        let tri = Triangle::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);

        // Normal should point in +Z direction
        assert!((tri.normal[0]).abs() < 0.001);
        assert!((tri.normal[1]).abs() < 0.001);
        assert!((tri.normal[2] - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_reversed_winding_flips_normal() {
        let tri = Triangle::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        assert!((tri.normal[2] + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_mesh_builder() {
        let mut builder = MeshBuilder::new();
        let a = builder.add_vertex([0.0, 0.0, 0.0]);
        let b = builder.add_vertex([1.0, 0.0, 0.0]);
        let c = builder.add_vertex([1.0, 1.0, 0.0]);
        let d = builder.add_vertex([0.0, 1.0, 0.0]);
        builder.add_triangle(a, b, d);
        builder.add_quad(a, b, c, d);

        let mesh = builder.finish();
        assert_eq!(mesh.triangle_count(), 3); // 1 triangle + 2 from quad
        assert_eq!(mesh.normals.len(), 3);
        assert_eq!(mesh.triangle(2).vertices[1], [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_stats_extents() {
        let mut builder = MeshBuilder::new();
        builder.add_vertex([-1.0, 0.0, 0.5]);
        builder.add_vertex([3.0, 2.0, 4.5]);
        builder.add_vertex([0.0, -2.0, 1.0]);
        builder.extend([[0, 1, 2]]);
        let stats = builder.finish().stats();
        assert_eq!(stats.triangle_count, 1);
        assert_eq!(stats.vertex_count, 3);
        assert_eq!(stats.extents(), [4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_empty_stats() {
        let stats = Mesh::default().stats();
        assert_eq!(stats.extents(), [0.0; 3]);
    }
}
