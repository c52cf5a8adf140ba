// Exclusive panel claim, taken in begin() and dropped in end()

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;

pub struct DeviceClaim<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DeviceClaim<'a> {
    pub fn acquire(flag: &'a AtomicBool) -> Result<Self, Error> {
        critical_section::with(|_| {
            if flag.load(Ordering::Acquire) {
                return Err(Error::DeviceClaimed);
            }
            flag.store(true, Ordering::Release);
            Ok(Self { flag })
        })
    }
}

impl Drop for DeviceClaim<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_first_drops() {
        let flag = AtomicBool::new(false);
        let first = DeviceClaim::acquire(&flag).unwrap();
        assert!(matches!(
            DeviceClaim::acquire(&flag),
            Err(Error::DeviceClaimed)
        ));
        drop(first);
        assert!(DeviceClaim::acquire(&flag).is_ok());
    }
}
