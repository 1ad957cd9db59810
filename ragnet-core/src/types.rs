use num_traits::{Float, NumAssignOps, NumOps};
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// A trait representing the element types usable in ragnet tensors.
///
/// Every kernel of the ops backend is generic over this bound. It is reserved
/// to floating-point types (`f32`, `f64`): softmax needs `exp`, and gradient
/// checks convert through `f64`.
pub trait Numeric:
    Float // Includes Num + Copy + NumCast + ToPrimitive
    + NumAssignOps // AddAssign, SubAssign, MulAssign, DivAssign
    + NumOps
    + Sum
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}

impl Numeric for f32 {}
impl Numeric for f64 {}
