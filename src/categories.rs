//! Derived court views: grouping by sport type and fixed-size pagination.

use crate::models::{Category, CourtRecord, Page};

pub const PAGE_SIZE: usize = 9;

/// aggregate
///
/// One category per distinct court type, in order of first appearance. The
/// image is the first non-empty one seen for the type; later records never
/// overwrite it.
pub fn aggregate(courts: &[CourtRecord]) -> Vec<Category> {
    let mut categories: Vec<Category> = Vec::new();

    for court in courts {
        let image = court.image.as_deref().filter(|url| !url.trim().is_empty());

        match categories
            .iter_mut()
            .find(|c| c.category_type == court.court_type)
        {
            Some(category) => {
                category.count += 1;
                if category.image.is_none() {
                    category.image = image.map(str::to_string);
                }
            }
            None => categories.push(Category {
                category_type: court.court_type.clone(),
                count: 1,
                image: image.map(str::to_string),
            }),
        }
    }

    categories
}

/// Courts whose type is exactly `court_type`, in source order.
pub fn courts_of_type(courts: &[CourtRecord], court_type: &str) -> Vec<CourtRecord> {
    courts
        .iter()
        .filter(|court| court.court_type == court_type)
        .cloned()
        .collect()
}

/// paginate
///
/// Slices `items` into pages of [`PAGE_SIZE`]. `page` is 1-based and clamped:
/// anything below 1 yields the first page, anything past the end the last
/// page. An empty input is a single empty page.
pub fn paginate<T: Clone>(items: &[T], page: i64) -> Page<T> {
    let total_items = items.len();
    let total_pages = total_items.div_ceil(PAGE_SIZE).max(1);
    let page = page.clamp(1, total_pages as i64) as usize;

    let start = (page - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(total_items);

    Page {
        items: items[start..end].to_vec(),
        page,
        total_pages,
        total_items,
    }
}
