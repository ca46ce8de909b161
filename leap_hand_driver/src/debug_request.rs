//! Text commands sent to the driver through the host's debug request channel.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::math::is_rotation;

pub const REALIGN_COORDINATES: &str = "leap:realign_coordinates";

/// Number of floats following [`REALIGN_COORDINATES`].
const REALIGN_ARGUMENTS: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DebugRequest {
    RealignCoordinates {
        /// Row-major.
        rotation: [[f32; 3]; 3],
        translation: [f32; 3],
    },
}

impl DebugRequest {
    pub fn rotation_matrix(rotation: &[[f32; 3]; 3]) -> Matrix3<f32> {
        Matrix3::from_fn(|r, c| rotation[r][c])
    }

    pub fn translation_vector(translation: &[f32; 3]) -> Vector3<f32> {
        Vector3::from_column_slice(translation)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DebugRequestError {
    #[error("empty debug request")]
    Empty,
    #[error("unknown debug request {0:?}")]
    UnknownCommand(String),
    #[error("expected {expected} arguments, got {got}")]
    MissingArgument { expected: usize, got: usize },
    #[error("argument {index} is not a finite number: {value:?}")]
    InvalidNumber { index: usize, value: String },
    #[error("realign matrix is not a rotation")]
    NotARotation,
}

/// Parses one debug request.
///
/// The realign command carries the world-from-driver rotation column by column,
/// each column followed by one translation component.
pub fn parse_debug_request(request: &str) -> Result<DebugRequest, DebugRequestError> {
    let mut tokens = request.split_whitespace();
    let command = tokens.next().ok_or(DebugRequestError::Empty)?;
    if command != REALIGN_COORDINATES {
        return Err(DebugRequestError::UnknownCommand(command.to_owned()));
    }

    let values = tokens
        .take(REALIGN_ARGUMENTS)
        .enumerate()
        .map(|(index, token)| {
            token
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| DebugRequestError::InvalidNumber {
                    index,
                    value: token.to_owned(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() < REALIGN_ARGUMENTS {
        return Err(DebugRequestError::MissingArgument {
            expected: REALIGN_ARGUMENTS,
            got: values.len(),
        });
    }

    let mut rotation = [[0.0; 3]; 3];
    let mut translation = [0.0; 3];
    for (column, chunk) in values.chunks_exact(4).enumerate() {
        for row in 0..3 {
            rotation[row][column] = chunk[row];
        }
        translation[column] = chunk[3];
    }
    if !is_rotation(&DebugRequest::rotation_matrix(&rotation)) {
        return Err(DebugRequestError::NotARotation);
    }

    Ok(DebugRequest::RealignCoordinates {
        rotation,
        translation,
    })
}
