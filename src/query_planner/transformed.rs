/// Result of a rewrite pass: the (possibly new) value and whether the pass
/// changed anything.
#[derive(Debug, PartialEq, Clone)]
pub enum Transformed<T> {
    Yes(T),
    No(T),
}

impl<T> Transformed<T> {
    pub fn get_model(self) -> T {
        match self {
            Transformed::Yes(model) | Transformed::No(model) => model,
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }

    pub fn from_flag(changed: bool, value: T) -> Self {
        if changed {
            Transformed::Yes(value)
        } else {
            Transformed::No(value)
        }
    }
}
