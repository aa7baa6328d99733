/// Async counterpart to the standard library's `TryFrom<T>` trait.
///
/// Used where building a value needs I/O, such as fingerprinting a file
/// from its path.
pub trait AsyncTryFrom<T>: Sized {
    /// The error type that can occur during conversion.
    type Error;

    /// Performs the fallible asynchronous conversion from `T` to `Self`.
    async fn async_try_from(value: T) -> Result<Self, Self::Error>;
}
