//! Computed chunk data.

use ndarray::{arr0, Array0, Array2, Array4, ArrayView4, Axis, CowArray, Ix4};
use raster_common::Element;

/// The pixels of one output chunk, shape `(1, 1, rows, cols)`.
///
/// Fill blocks keep a single element and expand it lazily through a
/// zero-stride broadcast view, so a chunk with no data costs one element of
/// memory until someone asks for an owned array.
#[derive(Debug, Clone, PartialEq)]
pub enum Block<T: Element> {
    Fill { value: Array0<T>, shape: [usize; 4] },
    Data(Array4<T>),
}

impl<T: Element> Block<T> {
    /// A uniform block of `value`.
    pub fn fill(value: T, shape: [usize; 4]) -> Self {
        Self::Fill {
            value: arr0(value),
            shape,
        }
    }

    /// Wrap a 2-D read result with the two leading singleton axes.
    pub fn from_window(data: Array2<T>) -> Self {
        Self::Data(data.insert_axis(Axis(0)).insert_axis(Axis(0)))
    }

    pub fn shape(&self) -> [usize; 4] {
        match self {
            Self::Fill { shape, .. } => *shape,
            Self::Data(data) => {
                let d = data.dim();
                [d.0, d.1, d.2, d.3]
            }
        }
    }

    pub fn is_fill(&self) -> bool {
        matches!(self, Self::Fill { .. })
    }

    /// Borrow the block as a 4-D array without materializing fills.
    pub fn view(&self) -> CowArray<'_, T, Ix4> {
        match self {
            Self::Fill { value, shape } => match value.broadcast(*shape) {
                Some(view) => CowArray::from(view),
                None => CowArray::from(Array4::from_elem(*shape, value[()])),
            },
            Self::Data(data) => CowArray::from(data.view()),
        }
    }

    /// Borrow plain data blocks; `None` for fills.
    pub fn data(&self) -> Option<ArrayView4<'_, T>> {
        match self {
            Self::Fill { .. } => None,
            Self::Data(data) => Some(data.view()),
        }
    }

    /// Materialize the block.
    pub fn into_owned(self) -> Array4<T> {
        match self {
            Self::Fill { value, shape } => Array4::from_elem(shape, value[()]),
            Self::Data(data) => data,
        }
    }
}
