use crate::domain::reservation::reservation::Reservation;
use crate::domain::reservation::reservation_request::ReservationRequestKind;
use crate::domain::reservation::reservation_wait::ReservationWait;
use crate::error::Result;

/// The boundary every allocation backend (cluster scheduler, cloud provider,
/// ...) implements.
///
/// Neither method may block on the allocation itself. Slow work belongs in the
/// allocation function handed to the returned [`ReservationWait`].
pub trait ReservationInterface: std::fmt::Debug + Send + Sync {
    /// Performs a reservation as described by `request`.
    ///
    /// Returns immediately with a [`ReservationWait`] whose worker carries out
    /// the allocation.
    ///
    /// # Errors
    /// `Error::InvalidArgument` if the request is malformed. Allocation
    /// failures are not reported here but on the wait's `get`.
    fn reserve(&self, request: ReservationRequestKind) -> Result<ReservationWait>;

    /// Stops a reservation and releases its nodes in the backend.
    ///
    /// Must return without blocking on the backend's deallocation.
    fn stop_reservation(&self, reservation: &Reservation) -> Result<()>;
}
