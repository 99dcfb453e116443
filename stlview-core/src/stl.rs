/// STL triangle stream producer for binary and ASCII files
use std::io::Read;

use nom::{
    bytes::complete::{tag, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    number::complete::{float, le_f32, le_u32},
    sequence::preceded,
    IResult,
};

use crate::error::{Cancelled, Result, StreamError};
use crate::geometry::{Triangle, Vertex};
use crate::mesh::{MeshSink, TriangleMesh};
use crate::source::TriangleSource;

const HEADER_LEN: usize = 80;
const RECORD_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StlFormat {
    Binary,
    Ascii,
}

#[derive(Debug)]
enum Payload {
    Binary(Vec<u8>),
    Ascii(String),
}

/// Streams the triangles of an STL file.
///
/// The whole file is read into memory up front so that the expected
/// triangle count and the solid name are known before streaming starts.
#[derive(Debug)]
pub struct StlImporter {
    payload: Payload,
    expected: usize,
    name: String,
}

impl StlImporter {
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(mut data: Vec<u8>) -> Result<Self> {
        if looks_ascii(&data) {
            match String::from_utf8(data) {
                Ok(text) => {
                    let expected = text.matches("endfacet").count();
                    let name = ascii_header(&text)
                        .map(|(_, name)| name.trim().to_string())
                        .unwrap_or_default();
                    return Ok(Self {
                        payload: Payload::Ascii(text),
                        expected,
                        name,
                    });
                }
                Err(e) => data = e.into_bytes(),
            }
        }

        let count = binary_triangle_count(&data).ok_or(StreamError::TooSmall(data.len()))?;
        let name = binary_header_name(&data[..HEADER_LEN]);

        Ok(Self {
            payload: Payload::Binary(data),
            expected: count,
            name,
        })
    }

    pub fn format(&self) -> StlFormat {
        match self.payload {
            Payload::Binary(_) => StlFormat::Binary,
            Payload::Ascii(_) => StlFormat::Ascii,
        }
    }
}

impl TriangleSource for StlImporter {
    fn expected_triangle_count(&self) -> usize {
        self.expected
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stream(
        &mut self,
        emit: &mut dyn FnMut(Triangle) -> std::result::Result<(), Cancelled>,
    ) -> Result<()> {
        match &self.payload {
            Payload::Binary(data) => stream_binary(&data[HEADER_LEN + 4..], self.expected, emit),
            Payload::Ascii(text) => stream_ascii(text, emit),
        }
    }
}

/// `solid` prefix alone is not enough: many binary exporters write it into
/// the header too, so a binary file whose size matches its record count wins.
fn looks_ascii(data: &[u8]) -> bool {
    if !data.starts_with(b"solid") {
        return false;
    }
    let binary_len = binary_triangle_count(data)
        .and_then(|count| count.checked_mul(RECORD_LEN))
        .and_then(|n| n.checked_add(HEADER_LEN + 4));
    binary_len != Some(data.len())
}

fn binary_triangle_count(data: &[u8]) -> Option<usize> {
    let (_, count) = le_u32::<_, nom::error::Error<&[u8]>>(data.get(HEADER_LEN..)?).ok()?;
    Some(count as usize)
}

fn binary_header_name(header: &[u8]) -> String {
    let end = header.iter().position(|&b| b == 0).unwrap_or(header.len());
    let text = String::from_utf8_lossy(&header[..end]);
    let text = text.trim();
    text.strip_prefix("solid").unwrap_or(text).trim().to_string()
}

fn stream_binary(
    mut input: &[u8],
    expected: usize,
    emit: &mut dyn FnMut(Triangle) -> std::result::Result<(), Cancelled>,
) -> Result<()> {
    for found in 0..expected {
        let (rest, triangle) = binary_facet(input)
            .map_err(|_| StreamError::Truncated { expected, found })?;
        input = rest;
        emit(triangle)?;
    }
    Ok(())
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], Triangle> {
    let (input, normal) = binary_vector3(input)?;
    let (input, a) = binary_vector3(input)?;
    let (input, b) = binary_vector3(input)?;
    let (input, c) = binary_vector3(input)?;
    // Attribute byte count
    let (input, _) = take(2usize)(input)?;

    let vertex = |p: (f32, f32, f32)| Vertex::new(p.0, p.1, p.2, normal.0, normal.1, normal.2);
    Ok((input, Triangle::new(vertex(a), vertex(b), vertex(c))))
}

fn binary_vector3(input: &[u8]) -> IResult<&[u8], (f32, f32, f32)> {
    let (input, x) = le_f32(input)?;
    let (input, y) = le_f32(input)?;
    let (input, z) = le_f32(input)?;
    Ok((input, (x, y, z)))
}

fn stream_ascii(
    text: &str,
    emit: &mut dyn FnMut(Triangle) -> std::result::Result<(), Cancelled>,
) -> Result<()> {
    let (mut input, _) =
        ascii_header(text).map_err(|_| parse_error(text, text, "missing 'solid' header"))?;

    loop {
        match parse_facet(input) {
            Ok((rest, triangle)) => {
                input = rest;
                emit(triangle)?;
            }
            // Failed past the `facet` keyword: point at the offending token
            Err(nom::Err::Error(err) | nom::Err::Failure(err))
                if err.input.len() < input.trim_start().len() =>
            {
                return Err(parse_error(text, err.input, "malformed facet"));
            }
            Err(_) => break,
        }
    }

    preceded(multispace0, tag::<_, _, nom::error::Error<&str>>("endsolid"))(input)
        .map_err(|_| parse_error(text, input, "expected 'facet' or 'endsolid'"))?;
    Ok(())
}

fn parse_error(text: &str, remaining: &str, message: &str) -> StreamError {
    let offset = text.len() - remaining.trim_start().len();
    StreamError::Parse {
        line: text[..offset].matches('\n').count() + 1,
        message: message.to_string(),
    }
}

fn ascii_header(input: &str) -> IResult<&str, &str> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    not_line_ending(input)
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Read a whole STL file into a mesh on the calling thread
pub fn parse_stl(data: &[u8]) -> Result<TriangleMesh> {
    let mut importer = StlImporter::from_bytes(data.to_vec())?;
    let mut mesh = TriangleMesh::new();
    importer.stream(&mut |t| {
        mesh.add_triangle(&t);
        Ok(())
    })?;
    mesh.set_name(importer.name());
    Ok(mesh)
}
