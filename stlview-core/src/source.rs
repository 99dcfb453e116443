/// Producers of triangle streams consumed by the ingestion job
use crate::error::{Cancelled, Result};
use crate::geometry::Triangle;

/// A producer that yields triangles one at a time.
///
/// `stream` hands each triangle to `emit` in production order. When `emit`
/// returns `Err(Cancelled)` the producer must stop immediately and return
/// `StreamError::Cancelled` (the `?` operator does this).
pub trait TriangleSource {
    /// Number of triangles the producer expects to yield, known up front
    fn expected_triangle_count(&self) -> usize;

    /// Name of the solid, if the format carries one
    fn name(&self) -> &str;

    fn stream(
        &mut self,
        emit: &mut dyn FnMut(Triangle) -> std::result::Result<(), Cancelled>,
    ) -> Result<()>;
}

/// Streams an in-memory triangle list
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    triangles: Vec<Triangle>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, triangles: Vec<Triangle>) -> Self {
        Self {
            name: name.into(),
            triangles,
        }
    }
}

impl TriangleSource for MemorySource {
    fn expected_triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stream(
        &mut self,
        emit: &mut dyn FnMut(Triangle) -> std::result::Result<(), Cancelled>,
    ) -> Result<()> {
        for triangle in self.triangles.drain(..) {
            emit(triangle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::geometry::cube_triangles;

    #[test]
    fn test_memory_source_streams_in_order() {
        let triangles = cube_triangles(1.0);
        let mut source = MemorySource::new("cube", triangles.clone());
        assert_eq!(source.expected_triangle_count(), 12);

        let mut seen = Vec::new();
        source
            .stream(&mut |t| {
                seen.push(t);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, triangles);
    }

    #[test]
    fn test_memory_source_stops_on_cancel() {
        let mut source = MemorySource::new("cube", cube_triangles(1.0));
        let mut count = 0;
        let result = source.stream(&mut |_| {
            count += 1;
            if count == 3 {
                Err(Cancelled)
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(StreamError::Cancelled)));
        assert_eq!(count, 3);
    }
}
