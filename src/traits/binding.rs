use std::ops::Deref;

use super::backend::GraphicsBackend;

/// A resource that is activated against a global binding point.
///
/// `bind` makes the resource current; `release` clears the binding point again.
/// Prefer [`Bound`] over calling the pair by hand.
pub trait Bindable {
    fn bind(&self);
    fn release(&self);
}

/// Scoped binding of a [`Bindable`] resource.
///
/// Binds on construction and releases on drop, so the binding point is cleared
/// on every exit path, unwinding included.
#[must_use = "the resource is released as soon as the guard is dropped"]
pub struct Bound<'a, T: Bindable + ?Sized> {
    resource: &'a T,
}

impl<'a, T: Bindable + ?Sized> Bound<'a, T> {
    pub fn new(resource: &'a T) -> Self {
        resource.bind();
        Self { resource }
    }
}

impl<T: Bindable + ?Sized> Deref for Bound<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.resource
    }
}

impl<T: Bindable + ?Sized> Drop for Bound<'_, T> {
    fn drop(&mut self) {
        self.resource.release();
    }
}

/// Scoped binding of a 2D texture to a texture unit.
///
/// On drop the generic vertex array binding and the texture binding of the unit
/// are both cleared, leaving the binding points neutral for unrelated draws.
#[must_use = "the texture is unbound as soon as the guard is dropped"]
pub struct TextureUnitBinding<'a, B: GraphicsBackend> {
    backend: &'a B,
}

impl<'a, B: GraphicsBackend> TextureUnitBinding<'a, B> {
    pub fn new(backend: &'a B, unit: u32, texture: &B::Texture) -> Self {
        backend.active_texture(unit);
        backend.bind_texture_2d(Some(texture));
        Self { backend }
    }
}

impl<B: GraphicsBackend> Drop for TextureUnitBinding<'_, B> {
    fn drop(&mut self) {
        // The active unit is still the one selected in `new`.
        self.backend.unbind_vertex_array();
        self.backend.bind_texture_2d(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Probe {
        calls: RefCell<Vec<&'static str>>,
    }

    impl Bindable for Probe {
        fn bind(&self) {
            self.calls.borrow_mut().push("bind");
        }

        fn release(&self) {
            self.calls.borrow_mut().push("release");
        }
    }

    #[test]
    fn test_bound_releases_on_drop() {
        let probe = Probe::default();
        {
            let _guard = Bound::new(&probe);
            assert_eq!(*probe.calls.borrow(), vec!["bind"]);
        }
        assert_eq!(*probe.calls.borrow(), vec!["bind", "release"]);
    }

    struct Named<'a> {
        name: &'static str,
        log: &'a RefCell<Vec<String>>,
    }

    impl Bindable for Named<'_> {
        fn bind(&self) {
            self.log.borrow_mut().push(format!("bind {}", self.name));
        }

        fn release(&self) {
            self.log.borrow_mut().push(format!("release {}", self.name));
        }
    }

    #[test]
    fn test_nested_guards_release_in_reverse_order() {
        let log = RefCell::new(Vec::new());
        let geometry = Named { name: "geometry", log: &log };
        let program = Named { name: "program", log: &log };
        {
            let _geometry = Bound::new(&geometry);
            let _program = Bound::new(&program);
        }
        assert_eq!(
            *log.borrow(),
            vec!["bind geometry", "bind program", "release program", "release geometry"]
        );
    }

    #[test]
    fn test_bound_releases_on_early_return() {
        fn bail(probe: &Probe, fail: bool) -> Result<(), &'static str> {
            let _guard = Bound::new(probe);
            if fail {
                return Err("bail");
            }
            Ok(())
        }

        let probe = Probe::default();
        assert!(bail(&probe, true).is_err());
        assert_eq!(*probe.calls.borrow(), vec!["bind", "release"]);
    }

    #[test]
    fn test_bound_releases_on_unwind() {
        let probe = Probe::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = Bound::new(&probe);
            panic!("draw failed");
        }));
        assert!(result.is_err());
        assert_eq!(*probe.calls.borrow(), vec!["bind", "release"]);
    }
}
