//! Geometry file reader and shape-primitive rasterization (§6). Both are
//! listed as out-of-scope I/O glue in §1 ("straightforward once the core
//! contracts hold"); this module implements the literal text grammar and a
//! minimal set of primitives (sphere, rectangular box) so the rest of the
//! engine has something concrete to build a D-matrix over. Lymphocyte,
//! leucocyte, stick, and the other commented-out primitives named in §9's
//! Open Question are not implemented — see DESIGN.md.

use crate::error::ValidationError;
use std::io::BufRead;

/// A single occupied lattice site, read or generated before partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupiedSite {
    pub ix: i64,
    pub iy: i64,
    pub iz: i64,
    pub material: usize,
}

/// Dense, unpartitioned list of occupied sites plus the declared material count.
#[derive(Debug, Clone)]
pub struct Shape {
    pub sites: Vec<OccupiedSite>,
    pub nmat: usize,
    pub box_dims: (usize, usize, usize),
}

impl Shape {
    /// Parses the text geometry format described in §6:
    /// optional `#` comments, an optional `Nmat=<int>` header, then data
    /// lines of `x y z` or `x y z mat`. Coordinates must be non-negative.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ValidationError> {
        let mut nmat = 1usize;
        let mut sites = Vec::new();
        let mut max_x = 0i64;
        let mut max_y = 0i64;
        let mut max_z = 0i64;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                ValidationError::MalformedGeometryLine(lineno + 1, e.to_string())
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("Nmat=") {
                nmat = rest.trim().parse().map_err(|_| {
                    ValidationError::MalformedGeometryLine(lineno + 1, trimmed.to_string())
                })?;
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 3 && fields.len() != 4 {
                return Err(ValidationError::MalformedGeometryLine(
                    lineno + 1,
                    trimmed.to_string(),
                ));
            }
            let parse_coord = |s: &str| -> Result<i64, ValidationError> {
                s.parse::<i64>().map_err(|_| {
                    ValidationError::MalformedGeometryLine(lineno + 1, trimmed.to_string())
                })
            };
            let ix = parse_coord(fields[0])?;
            let iy = parse_coord(fields[1])?;
            let iz = parse_coord(fields[2])?;
            if ix < 0 || iy < 0 || iz < 0 {
                return Err(ValidationError::NegativeCoordinate(lineno + 1));
            }
            let material = if fields.len() == 4 {
                fields[3].parse::<usize>().map_err(|_| {
                    ValidationError::MalformedGeometryLine(lineno + 1, trimmed.to_string())
                })?
            } else {
                1
            };
            if material == 0 || material > nmat {
                return Err(ValidationError::MalformedGeometryLine(
                    lineno + 1,
                    format!("material {material} out of range 1..={nmat}"),
                ));
            }
            max_x = max_x.max(ix);
            max_y = max_y.max(iy);
            max_z = max_z.max(iz);
            sites.push(OccupiedSite { ix, iy, iz, material: material - 1 });
        }

        if sites.is_empty() {
            return Err(ValidationError::EmptyGeometry);
        }

        Ok(Shape {
            sites,
            nmat,
            box_dims: ((max_x + 1) as usize, (max_y + 1) as usize, (max_z + 1) as usize),
        })
    }

    /// A filled sphere of the given diameter (in dipoles), single material.
    pub fn sphere(diameter: usize) -> Self {
        let r = diameter as f64 / 2.0;
        let mut sites = Vec::new();
        for ix in 0..diameter {
            for iy in 0..diameter {
                for iz in 0..diameter {
                    let dx = ix as f64 + 0.5 - r;
                    let dy = iy as f64 + 0.5 - r;
                    let dz = iz as f64 + 0.5 - r;
                    if dx * dx + dy * dy + dz * dz <= r * r {
                        sites.push(OccupiedSite { ix: ix as i64, iy: iy as i64, iz: iz as i64, material: 0 });
                    }
                }
            }
        }
        Shape { sites, nmat: 1, box_dims: (diameter, diameter, diameter) }
    }

    /// A filled sphere with a concentric core of a second material (S2).
    pub fn coated_sphere(outer_diameter: usize, inner_radius_frac: f64) -> Self {
        let r_out = outer_diameter as f64 / 2.0;
        let r_in = r_out * inner_radius_frac;
        let mut sites = Vec::new();
        for ix in 0..outer_diameter {
            for iy in 0..outer_diameter {
                for iz in 0..outer_diameter {
                    let dx = ix as f64 + 0.5 - r_out;
                    let dy = iy as f64 + 0.5 - r_out;
                    let dz = iz as f64 + 0.5 - r_out;
                    let r2 = dx * dx + dy * dy + dz * dz;
                    if r2 <= r_out * r_out {
                        let material = if r2 <= r_in * r_in { 1 } else { 0 };
                        sites.push(OccupiedSite {
                            ix: ix as i64,
                            iy: iy as i64,
                            iz: iz as i64,
                            material,
                        });
                    }
                }
            }
        }
        Shape { sites, nmat: 2, box_dims: (outer_diameter, outer_diameter, outer_diameter) }
    }

    /// A solid rectangular box, single material.
    pub fn rectangular(bx: usize, by: usize, bz: usize) -> Self {
        let mut sites = Vec::with_capacity(bx * by * bz);
        for ix in 0..bx {
            for iy in 0..by {
                for iz in 0..bz {
                    sites.push(OccupiedSite { ix: ix as i64, iy: iy as i64, iz: iz as i64, material: 0 });
                }
            }
        }
        Shape { sites, nmat: 1, box_dims: (bx, by, bz) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_comment_header_and_plain_triples() {
        let text = "# a sample shape\nNmat=1\n0 0 0\n1 0 0\n0 1 0\n";
        let shape = Shape::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(shape.sites.len(), 3);
        assert_eq!(shape.nmat, 1);
        assert!(shape.sites.iter().all(|s| s.material == 0));
    }

    #[test]
    fn parses_quadruples_with_material_index() {
        let text = "Nmat=2\n0 0 0 1\n1 1 1 2\n";
        let shape = Shape::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(shape.sites[0].material, 0);
        assert_eq!(shape.sites[1].material, 1);
    }

    #[test]
    fn rejects_negative_coordinates() {
        let text = "0 0 0\n-1 0 0\n";
        let err = Shape::from_reader(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ValidationError::NegativeCoordinate(2)));
    }

    #[test]
    fn rejects_empty_geometry() {
        let text = "# nothing here\n";
        let err = Shape::from_reader(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyGeometry));
    }

    #[test]
    fn sphere_is_symmetric_about_center() {
        let shape = Shape::sphere(16);
        assert!(shape.sites.len() > 1000);
        assert_eq!(shape.box_dims, (16, 16, 16));
    }
}
