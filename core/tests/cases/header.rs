use httptraffic_core::{HeaderError, HttpSeqHeader, Packet, HTTP_SEQ_HEADER_SIZE};

#[test]
fn test_header_travels_with_its_packet() {
    let mut packet = Packet::with_padding(500);
    packet.add_header(&HttpSeqHeader::new(500, 4, 1).unwrap());
    assert_eq!(packet.size(), 508);

    let (header, consumed) = packet.remove_header().unwrap();
    assert_eq!(consumed, HTTP_SEQ_HEADER_SIZE);
    assert_eq!((header.length(), header.object(), header.page()), (500, 4, 1));
    assert_eq!(packet.size(), 500);
}

#[test]
fn test_short_packet_is_rejected() {
    let mut packet = Packet::new(&[0, 0, 1], 0);
    assert_eq!(
        packet.remove_header().unwrap_err(),
        HeaderError::Truncated { needed: 8, available: 3 }
    );
}

#[test]
fn test_indices_must_fit_the_wire_format() {
    assert!(HttpSeqHeader::new(1, 65_535, 65_535).is_ok());
    assert!(matches!(
        HttpSeqHeader::new(1, 65_536, 1),
        Err(HeaderError::FieldOverflow { .. })
    ));
}
