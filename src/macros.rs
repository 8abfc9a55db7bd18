/// Puts `$with` into the [`Option`] `$container`, returning `Err($err)` from the enclosing
/// function if the container was already filled.
macro_rules! fill_once {
    ($container:expr, $with:expr, $err:expr) => {
        if $container.replace($with).is_some() {
            return Err($err);
        }
    };
}

pub(crate) use fill_once;
