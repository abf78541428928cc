/// Typed wrapper which is used to signify that no other thread
/// has the same ID.
#[derive(Clone, Copy, Debug)]
pub struct UniqueId(usize);

impl UniqueId {
    /// # Safety
    ///
    /// No other lane of the same dispatch may hold a `UniqueId` with the
    /// same value while this one is used to address a shared buffer.
    #[inline(always)]
    pub unsafe fn new(idx: usize) -> Self {
        Self(idx)
    }
    #[inline(always)]
    pub fn idx(&self) -> usize {
        self.0
    }
}

impl From<UniqueId> for usize {
    fn from(value: UniqueId) -> Self {
        value.idx()
    }
}

impl PartialEq<usize> for UniqueId {
    #[inline(always)]
    fn eq(&self, other: &usize) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<usize> for UniqueId {
    #[inline(always)]
    fn partial_cmp(&self, other: &usize) -> Option<core::cmp::Ordering> {
        Some(self.0.cmp(other))
    }
}

/// This trait allows users to promise that their type is able
/// to produce unique by-thread values (i.e. no two threads will)
/// produce the same value. Keep in mind that this property must hold
/// for _all_ values of the type.
#[allow(unused)]
pub unsafe trait ThreadLayout {
    #[cfg(target_arch = "nvptx64")]
    fn uid(&self) -> UniqueId;

    #[cfg(not(any(target_arch = "nvptx64")))]
    fn uid(&self) -> UniqueId {
        panic!("Attempting to call ThreadLayout::uid() from host code!");
    }
}

/// One lane's view of the workgroup it executes in.
///
/// Every lane of a group sees the same `local_size` and `group_id`, and a
/// distinct `local_id` in `0..local_size`. Lanes of a group share group-local
/// scratch memory and meet at `barrier`.
///
/// # Safety
///
/// Implementors promise that `local_id` is unique within the group and that
/// `barrier` returns to no lane before every lane of the group has entered it.
/// Writes made before the barrier must be visible to all lanes after it.
pub unsafe trait Workgroup {
    fn local_id(&self) -> usize;
    fn local_size(&self) -> usize;
    fn group_id(&self) -> usize;
    fn barrier(&self);

    /// Linear id across the whole (1D) dispatch.
    #[inline(always)]
    fn global_id(&self) -> usize {
        self.group_id() * self.local_size() + self.local_id()
    }

    /// The global id as a [`UniqueId`], usable to address global buffers.
    #[inline(always)]
    fn global_uid(&self) -> UniqueId {
        // SAFETY: group ids are distinct across groups and local ids are
        // distinct within one, so the linear id is unique per lane.
        unsafe { UniqueId::new(self.global_id()) }
    }
}
