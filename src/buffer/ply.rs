use std::io::{BufRead, Write};

use crate::{Error, SH_REST_COUNT};

/// The scalar types a hair splat PLY property may have.
///
/// Only 4-byte scalars are supported so a row is always a sequence of 32 bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyScalar {
    Float,
    Int,
    UInt,
}

impl PlyScalar {
    /// Parse the PLY type name.
    pub fn parse(ty: &str) -> Option<Self> {
        match ty {
            "float" | "float32" => Some(Self::Float),
            "int" | "int32" => Some(Self::Int),
            "uint" | "uint32" => Some(Self::UInt),
            _ => None,
        }
    }
}

/// A property of the vertex element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyProperty {
    pub name: String,
    pub ty: PlyScalar,
}

/// The header of a binary little endian splat PLY file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyHeader {
    /// The number of vertices.
    pub vertex_count: usize,
    /// The vertex properties in row order.
    pub properties: Vec<PlyProperty>,
}

impl PlyHeader {
    /// The properties a hair splat file must carry.
    pub const REQUIRED_PROPERTIES: [&'static str; 14] = [
        "x", "y", "z", "opacity", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2",
        "rot_3", "f_dc_0", "f_dc_1", "f_dc_2",
    ];

    /// The strand count metadata property.
    pub const STRAND_COUNT_PROPERTY: &'static str = "n_strands";

    /// The gaussians per strand metadata property.
    pub const GAUSSIANS_PER_STRAND_PROPERTY: &'static str = "n_gaussians_per_strand";

    /// Read the header, leaving the reader at the start of the vertex payload.
    pub fn read(reader: &mut impl BufRead) -> Result<Self, Error> {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.as_str().trim().to_lowercase() != "ply" {
            return Err(Error::NotPly);
        }

        let mut vertex_count = None;
        let mut properties = Vec::new();
        let mut in_vertex = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(Error::PlyHeaderNotFound);
            }

            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("end_header") => break,
                Some("format") => {
                    let format = tokens.next().unwrap_or_default();
                    if format != "binary_little_endian" {
                        return Err(Error::PlyUnsupportedFormat(format.to_string()));
                    }
                }
                Some("element") => {
                    in_vertex = tokens.next() == Some("vertex");
                    if in_vertex {
                        vertex_count = Some(
                            tokens
                                .next()
                                .ok_or(Error::PlyVertexCountNotFound)?
                                .parse()?,
                        );
                    }
                }
                Some("property") if in_vertex => {
                    let ty = tokens.next().unwrap_or_default();
                    let name = tokens.next_back().unwrap_or_default().to_string();
                    let ty = PlyScalar::parse(ty).ok_or_else(|| {
                        Error::PlyUnsupportedPropertyType {
                            name: name.clone(),
                            ty: ty.to_string(),
                        }
                    })?;
                    properties.push(PlyProperty { name, ty });
                }
                _ => {}
            }
        }

        Ok(Self {
            vertex_count: vertex_count.ok_or(Error::PlyVertexCountNotFound)?,
            properties,
        })
    }

    /// The header for `vertex_count` [`PlyHairGaussianPod`] rows.
    pub fn hair(vertex_count: usize) -> Self {
        let float = |name: String| PlyProperty {
            name,
            ty: PlyScalar::Float,
        };

        let properties = ["x", "y", "z", "opacity"]
            .into_iter()
            .map(str::to_string)
            .chain((0..3).map(|i| format!("scale_{i}")))
            .chain((0..4).map(|i| format!("rot_{i}")))
            .chain((0..3).map(|i| format!("f_dc_{i}")))
            .chain((0..SH_REST_COUNT).map(|i| format!("f_rest_{i}")))
            .map(float)
            .chain(
                [
                    Self::STRAND_COUNT_PROPERTY,
                    Self::GAUSSIANS_PER_STRAND_PROPERTY,
                ]
                .into_iter()
                .map(|name| PlyProperty {
                    name: name.to_string(),
                    ty: PlyScalar::Int,
                }),
            )
            .collect();

        Self {
            vertex_count,
            properties,
        }
    }

    /// Write the header.
    pub fn write(&self, writer: &mut impl Write) -> Result<(), Error> {
        writeln!(writer, "ply")?;
        writeln!(writer, "format binary_little_endian 1.0")?;
        writeln!(writer, "element vertex {}", self.vertex_count)?;
        for property in &self.properties {
            let ty = match property.ty {
                PlyScalar::Float => "float",
                PlyScalar::Int => "int",
                PlyScalar::UInt => "uint",
            };
            writeln!(writer, "property {ty} {}", property.name)?;
        }
        writeln!(writer, "end_header")?;
        Ok(())
    }

    /// Check if the vertex element has a property.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }

    /// Check if the strand metadata is present.
    pub fn has_strand_metadata(&self) -> bool {
        self.has_property(Self::STRAND_COUNT_PROPERTY)
            && self.has_property(Self::GAUSSIANS_PER_STRAND_PROPERTY)
    }

    /// Return an error naming the first missing required property.
    pub fn check_required(&self) -> Result<(), Error> {
        match Self::REQUIRED_PROPERTIES
            .iter()
            .find(|name| !self.has_property(name))
        {
            Some(name) => Err(Error::PlyMissingProperty(*name)),
            None => Ok(()),
        }
    }
}

/// The POD representation of a hair Gaussian in PLY format, in storage domain.
///
/// Fields are stored as arrays because using glam types would add padding
/// according to C alignment rules.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PlyHairGaussianPod {
    pub pos: [f32; 3],
    /// Logit of the opacity.
    pub opacity: f32,
    /// Natural log of the scale.
    pub scale: [f32; 3],
    /// \[w, x, y, z\]
    pub rot: [f32; 4],
    pub color: [f32; 3],
    /// Grouped by channel, then by band.
    pub sh: [f32; SH_REST_COUNT],
    pub strand_count: i32,
    pub gaussians_per_strand: i32,
}

impl PlyHairGaussianPod {
    /// Check if a property name maps to a field.
    pub fn is_known_property(name: &str) -> bool {
        matches!(
            name,
            "x" | "y"
                | "z"
                | "opacity"
                | "scale_0"
                | "scale_1"
                | "scale_2"
                | "rot_0"
                | "rot_1"
                | "rot_2"
                | "rot_3"
                | "f_dc_0"
                | "f_dc_1"
                | "f_dc_2"
                | PlyHeader::STRAND_COUNT_PROPERTY
                | PlyHeader::GAUSSIANS_PER_STRAND_PROPERTY
        ) || Self::rest_index(name).is_some()
    }

    /// Set a property from the raw 32 bit word read from the file.
    pub fn set_value(&mut self, name: &str, ty: PlyScalar, word: u32) {
        let float = match ty {
            PlyScalar::Float => f32::from_bits(word),
            PlyScalar::Int => word as i32 as f32,
            PlyScalar::UInt => word as f32,
        };
        let int = match ty {
            PlyScalar::Float => f32::from_bits(word) as i32,
            PlyScalar::Int | PlyScalar::UInt => word as i32,
        };

        match name {
            "x" => self.pos[0] = float,
            "y" => self.pos[1] = float,
            "z" => self.pos[2] = float,
            "opacity" => self.opacity = float,
            "scale_0" => self.scale[0] = float,
            "scale_1" => self.scale[1] = float,
            "scale_2" => self.scale[2] = float,
            "rot_0" => self.rot[0] = float,
            "rot_1" => self.rot[1] = float,
            "rot_2" => self.rot[2] = float,
            "rot_3" => self.rot[3] = float,
            "f_dc_0" => self.color[0] = float,
            "f_dc_1" => self.color[1] = float,
            "f_dc_2" => self.color[2] = float,
            PlyHeader::STRAND_COUNT_PROPERTY => self.strand_count = int,
            PlyHeader::GAUSSIANS_PER_STRAND_PROPERTY => self.gaussians_per_strand = int,
            _ => {
                if let Some(i) = Self::rest_index(name) {
                    self.sh[i] = float;
                }
            }
        }
    }

    fn rest_index(name: &str) -> Option<usize> {
        name.strip_prefix("f_rest_")
            .and_then(|i| i.parse::<usize>().ok())
            .filter(|i| *i < SH_REST_COUNT)
    }
}
