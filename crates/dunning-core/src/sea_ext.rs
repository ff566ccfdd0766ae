use sea_orm::{EntityTrait, QuerySelect, Select};

use dunning_domain::pagination::PageRequest;

/// Apply a clamped `PageRequest` as `OFFSET`/`LIMIT`.
pub trait Paginate {
    fn paginate_by(self, page: PageRequest) -> Self;
}

impl<E> Paginate for Select<E>
where
    E: EntityTrait,
{
    fn paginate_by(self, page: PageRequest) -> Self {
        self.offset(page.offset()).limit(page.limit())
    }
}
