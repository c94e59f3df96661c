//! Header page view.
//!
//! The header page stores a single field: the current root page ID. It is
//! the stable entry point by which a tree is reopened.

use super::{read_u32, write_u32};
use arbor_common::page::{PageData, PageId};

const ROOT_PAGE_ID_OFFSET: usize = 0;

/// Read-only view of the header page.
pub(crate) struct HeaderPageRef<'a> {
    data: &'a PageData,
}

impl<'a> HeaderPageRef<'a> {
    pub(crate) fn attach(data: &'a PageData) -> Self {
        Self { data }
    }

    pub(crate) fn root_page_id(&self) -> PageId {
        PageId(read_u32(self.data, ROOT_PAGE_ID_OFFSET))
    }
}

/// Mutable view of the header page.
pub(crate) struct HeaderPageMut<'a> {
    data: &'a mut PageData,
}

impl<'a> HeaderPageMut<'a> {
    pub(crate) fn attach(data: &'a mut PageData) -> Self {
        Self { data }
    }

    pub(crate) fn set_root_page_id(&mut self, page_id: PageId) {
        write_u32(self.data, ROOT_PAGE_ID_OFFSET, page_id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::page::PAGE_SIZE;

    #[test]
    fn test_header_roundtrip() {
        let mut data = [0u8; PAGE_SIZE];

        HeaderPageMut::attach(&mut data).set_root_page_id(PageId(42));

        let header = HeaderPageRef::attach(&data);
        assert_eq!(header.root_page_id(), PageId(42));
    }

    #[test]
    fn test_header_invalid_sentinel() {
        let mut data = [0u8; PAGE_SIZE];

        // A zeroed page reads as root = page 0; the tree must initialize
        // the sentinel explicitly.
        assert_eq!(HeaderPageRef::attach(&data).root_page_id(), PageId(0));

        HeaderPageMut::attach(&mut data).set_root_page_id(PageId::INVALID);
        assert_eq!(
            HeaderPageRef::attach(&data).root_page_id(),
            PageId::INVALID
        );
    }
}
