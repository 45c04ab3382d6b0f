use crate::ecs::archetype::Archetype;
use crate::ecs::component::Component;
use crate::ecs::mask::ComponentMask;
use crate::ecs::world::World;

/// Backs `World::add_components`/`World::remove_components`. Registering a
/// brand-new component type requires `&mut World`, so this trait is separate
/// from [`Query`], which must work from a shared `&World` so `for_each` can
/// run from multiple reader threads at once.
pub trait ComponentList {
    fn register_mask(world: &mut World) -> ComponentMask;
}

/// Backs `World::for_each`. `try_mask` never mutates the registry: a
/// component type nobody has added yet simply matches zero archetypes,
/// rather than forcing every reader to take `&mut World` just to look up an
/// id (spec.md section 4.D, "Concurrency").
pub trait Query<'w> {
    type Item;

    fn try_mask(world: &World) -> Option<ComponentMask>;

    /// # Safety
    /// `archetype` must contain every component type in `Self` and `index`
    /// must be `< archetype.size`. Satisfied by `World::for_each`, the only
    /// caller.
    unsafe fn fetch(archetype: &'w Archetype, index: usize, world: &'w World) -> Self::Item;
}

macro_rules! impl_component_list {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentList for ($($t,)+) {
            fn register_mask(world: &mut World) -> ComponentMask {
                let mut mask = ComponentMask::EMPTY;
                $(mask.set(world.register_component::<$t>());)+
                mask
            }
        }
    };
}

macro_rules! impl_query {
    ($($t:ident),+) => {
        impl<'w, $($t: Component),+> Query<'w> for ($($t,)+) {
            type Item = ($(&'w $t,)+);

            fn try_mask(world: &World) -> Option<ComponentMask> {
                let mut mask = ComponentMask::EMPTY;
                $(mask.set(world.registry.try_id_of::<$t>()?);)+
                Some(mask)
            }

            unsafe fn fetch(archetype: &'w Archetype, index: usize, world: &'w World) -> Self::Item {
                (
                    $({
                        let id = world.registry.try_id_of::<$t>().expect("queried type not registered");
                        let ptr = archetype
                            .component_ptr(id, index, &world.registry)
                            .expect("queried type missing from matched archetype");
                        unsafe { &*(ptr as *const $t) }
                    },)+
                )
            }
        }
    };
}

impl_component_list!(A);
impl_component_list!(A, B);
impl_component_list!(A, B, C);
impl_component_list!(A, B, C, D);
impl_component_list!(A, B, C, D, E);
impl_component_list!(A, B, C, D, E, F);
impl_component_list!(A, B, C, D, E, F, G);
impl_component_list!(A, B, C, D, E, F, G, H);

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);
impl_query!(A, B, C, D, E);
impl_query!(A, B, C, D, E, F);
impl_query!(A, B, C, D, E, F, G);
impl_query!(A, B, C, D, E, F, G, H);
