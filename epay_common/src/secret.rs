use std::{
    fmt,
    fmt::{Debug, Display},
};

/// Wraps credentials and card data so that they never end up in log output by accident. The only way to get at the
/// value is an explicit call to [`Secret::reveal`].
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    /// Shows only the last four characters, e.g. `****5096`, which is enough to tell cards and tokens apart in
    /// logs. Values shorter than eight characters are fully masked.
    pub fn masked(&self) -> String {
        let chars = self.value.chars().collect::<Vec<_>>();
        if chars.len() < 8 {
            return "****".to_string();
        }
        let tail = chars[chars.len() - 4..].iter().collect::<String>();
        format!("****{tail}")
    }
}

impl<T: Clone + Default> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}
